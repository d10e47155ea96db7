//! Diagnostic lightcurve plots for later visual inspection.
//!
//! One PNG per passing observation: flux against time, with the target
//! identifier drawn near the flux peak. Emission is best-effort at the call
//! sites; failures here never fail a pipeline run.

use camino::{Utf8Path, Utf8PathBuf};
use plotters::prelude::*;

use crate::errors::EnsembleError;
use crate::lightcurve::LightcurveSeries;

const PLOT_WIDTH: u32 = 1200;
const PLOT_HEIGHT: u32 = 800;

/// Figure path for one observation's diagnostic plot.
pub fn figure_path(dir: &Utf8Path, identifier: &str, sector: usize) -> Utf8PathBuf {
    dir.join(format!(
        "{identifier}_full_corrected_lc_observation_{sector}.png"
    ))
}

/// Render a time-vs-flux line plot to `path`.
///
/// Arguments
/// -----------------
/// * `path`: output PNG location.
/// * `title`: chart caption, e.g. `Observation: 3`.
/// * `label`: identifier annotation, drawn near the flux peak.
/// * `series`: the corrected series to draw.
pub fn plot_lightcurve(
    path: &Utf8Path,
    title: &str,
    label: &str,
    series: &LightcurveSeries,
) -> Result<(), EnsembleError> {
    if series.is_empty() {
        return Err(EnsembleError::PlotFailed(
            "empty lightcurve series".to_string(),
        ));
    }

    let (t_min, t_max) = min_max(&series.time);
    let (f_min, f_max) = min_max(&series.flux);
    let f_range = f_max - f_min;
    // keep degenerate (flat or single-point) series drawable
    let f_pad = if f_range > 0.0 { 0.05 * f_range } else { 1.0 };
    let t_pad = if t_max > t_min { 0.0 } else { 1.0 };

    let root = BitMapBackend::new(path.as_std_path(), (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(t_min - t_pad..t_max + t_pad, f_min - f_pad..f_max + f_pad)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Delta Time [Days]")
        .y_desc("Flux [e/s]")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            series.time.iter().zip(&series.flux).map(|(t, f)| (*t, *f)),
            &BLACK,
        ))
        .map_err(plot_err)?;

    // identifier annotation just below the peak
    chart
        .draw_series(std::iter::once(Text::new(
            label.to_string(),
            (series.time[0], f_max - 0.05 * f_range),
            ("sans-serif", 24),
        )))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(*v), hi.max(*v))
    })
}

fn plot_err<E: std::fmt::Display>(e: E) -> EnsembleError {
    EnsembleError::PlotFailed(e.to_string())
}
