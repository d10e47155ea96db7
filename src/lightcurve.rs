//! # Lightcurve types and the corrected-lightcurve seam
//!
//! This module defines the data carried by one observation's lightcurve and
//! the trait boundary to the systematics-correction collaborator.
//!
//! ## Overview
//!
//! - [`LightcurveSeries`] — the corrected (time, flux, flux error) series.
//! - [`PixelCube`] — a stack of square pixel frames, used for the
//!   scattered-light residual test.
//! - [`CorrectedLightcurve`] — the adapter trait wrapping one observation's
//!   image cube and correction algorithm. The detrending itself (principal
//!   component design matrices, aperture and background modeling) lives
//!   behind this seam and is not implemented here.
//! - [`LightcurveRecord`] — the serializable export of one passing
//!   observation, as stored in the persisted artifact.
//! - [`StoredLightcurve`] — a lazy handle to one record of a persisted
//!   artifact; the table is only materialized on access.
//!
//! Photometric conversions between instrument flux and magnitudes are
//! provided as free functions ([`flux_to_mag`], [`flux_err_to_mag_err`]).

use camino::{Utf8Path, Utf8PathBuf};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::constants::{Day, Flux, Magnitude, CALIBRATION_FLUX, CALIBRATION_MAG};
use crate::errors::EnsembleError;
use crate::persistence::EnsembleArtifact;

/// A corrected brightness time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightcurveSeries {
    /// Time offsets in days
    pub time: Vec<Day>,
    /// Corrected flux in electrons per second
    pub flux: Vec<Flux>,
    /// One-sigma flux uncertainty per point
    pub flux_err: Vec<Flux>,
}

impl LightcurveSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// A stack of square pixel frames indexed by time step.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelCube {
    pub frames: Vec<DMatrix<f64>>,
}

impl PixelCube {
    pub fn new(frames: Vec<DMatrix<f64>>) -> Self {
        PixelCube { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// One observation's corrected lightcurve, as produced by the external
/// correction collaborator.
///
/// The pipeline drives this trait strictly in order: [`near_edge`] before
/// [`correct`], and the cube/model/series accessors only after [`correct`]
/// has returned successfully.
///
/// [`near_edge`]: CorrectedLightcurve::near_edge
/// [`correct`]: CorrectedLightcurve::correct
pub trait CorrectedLightcurve {
    /// Whether the target sits too close to the detector edge for a uniform
    /// background subtraction.
    fn near_edge(&self) -> bool;

    /// Run the systematics correction, populating the derived fields.
    fn correct(&mut self) -> Result<(), EnsembleError>;

    /// The quality-checked pixel cube, available after correction.
    fn quality_cube(&self) -> &PixelCube;

    /// The normalized full-model image stack, available after correction.
    fn normalized_full_model(&self) -> &PixelCube;

    /// The final corrected time series, available after correction.
    fn corrected_series(&self) -> &LightcurveSeries;

    /// Export the corrected series as a persistable record.
    fn to_record(&self, sector: usize) -> LightcurveRecord {
        LightcurveRecord {
            sector,
            series: self.corrected_series().clone(),
        }
    }
}

/// The serializable export of one passing observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightcurveRecord {
    /// Index of the observation within the candidate list
    pub sector: usize,
    pub series: LightcurveSeries,
}

/// A lazy handle to one time-series record of a persisted artifact.
///
/// Reloading an ensemble constructs one of these per stored record without
/// materializing any tables; [`table`](StoredLightcurve::table) reads the
/// artifact on demand.
#[derive(Debug, Clone)]
pub struct StoredLightcurve {
    path: Utf8PathBuf,
    record_index: usize,
}

impl StoredLightcurve {
    pub fn new(path: impl Into<Utf8PathBuf>, record_index: usize) -> Self {
        StoredLightcurve {
            path: path.into(),
            record_index,
        }
    }

    pub fn record_index(&self) -> usize {
        self.record_index
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Materialize the stored record.
    ///
    /// Return
    /// ----------
    /// * The [`LightcurveRecord`] at this handle's position, or
    ///   [`EnsembleError::MalformedArtifact`] if the artifact no longer holds
    ///   a record at that position.
    pub fn table(&self) -> Result<LightcurveRecord, EnsembleError> {
        let artifact = EnsembleArtifact::read(&self.path)?;
        artifact
            .lightcurves
            .into_iter()
            .nth(self.record_index)
            .ok_or_else(|| {
                EnsembleError::MalformedArtifact(format!(
                    "no time-series record at position {} in {}",
                    self.record_index, self.path
                ))
            })
    }
}

/// Convert instrument flux to magnitudes in the instrument band.
///
/// Arguments
/// -----------------
/// * `flux`: flux in electrons per second.
///
/// Return
/// ----------
/// * The magnitude, anchored at [`CALIBRATION_MAG`] for [`CALIBRATION_FLUX`].
pub fn flux_to_mag(flux: Flux) -> Magnitude {
    2.5 * (CALIBRATION_FLUX / flux).log10() + CALIBRATION_MAG
}

/// Convert a flux uncertainty to a magnitude uncertainty.
///
/// First-order propagation through [`flux_to_mag`].
pub fn flux_err_to_mag_err(flux: Flux, flux_err: Flux) -> Magnitude {
    let d_mag_d_flux = -2.5 / (flux * std::f64::consts::LN_10);
    (d_mag_d_flux.powi(2) * flux_err.powi(2)).sqrt()
}
