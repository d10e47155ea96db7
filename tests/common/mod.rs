//! Synthetic observation source for pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use camino::Utf8Path;
use nalgebra::DMatrix;

use ensemble_lc::config::{ClusterAge, EnsembleConfig, Radius};
use ensemble_lc::ensemble::SectorSource;
use ensemble_lc::errors::EnsembleError;
use ensemble_lc::lightcurve::{CorrectedLightcurve, LightcurveSeries, PixelCube};

/// Small grid keeps the per-frame plane fits cheap.
pub const GRID: usize = 8;

/// Scripted terminal fate for one candidate observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    FailDownload,
    NearEdge,
    Scattered,
    Good,
}

/// A stand-in for the correction adapter, scripted to pass or fail gates.
pub struct FakeLightcurve {
    sector: usize,
    grid: usize,
    near_edge: bool,
    scattered: bool,
    quality: Option<PixelCube>,
    model: Option<PixelCube>,
    series: Option<LightcurveSeries>,
}

impl FakeLightcurve {
    pub fn new(sector: usize, grid: usize, fate: Fate) -> Self {
        FakeLightcurve {
            sector,
            grid,
            near_edge: fate == Fate::NearEdge,
            scattered: fate == Fate::Scattered,
            quality: None,
            model: None,
            series: None,
        }
    }
}

impl CorrectedLightcurve for FakeLightcurve {
    fn near_edge(&self) -> bool {
        self.near_edge
    }

    fn correct(&mut self) -> Result<(), EnsembleError> {
        let frames = 6;
        let model = vec![DMatrix::from_element(self.grid, self.grid, 1.0); frames];
        // contaminated observations carry a residual offset well past the
        // intercept threshold
        let offset = if self.scattered { 4.0 } else { 0.0 };
        let quality = vec![DMatrix::from_element(self.grid, self.grid, 1.0 + offset); frames];

        self.model = Some(PixelCube::new(model));
        self.quality = Some(PixelCube::new(quality));
        self.series = Some(LightcurveSeries {
            time: (0..30).map(|i| i as f64 * 0.02).collect(),
            flux: (0..30)
                .map(|i| 1000.0 + self.sector as f64 + (i as f64 * 0.5).sin())
                .collect(),
            flux_err: vec![1.0; 30],
        });
        Ok(())
    }

    fn quality_cube(&self) -> &PixelCube {
        self.quality.as_ref().expect("correct() not called")
    }

    fn normalized_full_model(&self) -> &PixelCube {
        self.model.as_ref().expect("correct() not called")
    }

    fn corrected_series(&self) -> &LightcurveSeries {
        self.series.as_ref().expect("correct() not called")
    }
}

/// Candidate list with scripted fates and a shared download counter.
pub struct ScriptedSource {
    fates: Vec<Fate>,
    downloads: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(fates: Vec<Fate>) -> (Self, Arc<AtomicUsize>) {
        let downloads = Arc::new(AtomicUsize::new(0));
        (
            ScriptedSource {
                fates,
                downloads: downloads.clone(),
            },
            downloads,
        )
    }
}

impl SectorSource for ScriptedSource {
    type Lightcurve = FakeLightcurve;

    fn sectors_available(&self) -> usize {
        self.fates.len()
    }

    fn download(
        &mut self,
        sector: usize,
        config: &EnsembleConfig,
        _cache_dir: Option<&Utf8Path>,
    ) -> Option<FakeLightcurve> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        match self.fates[sector] {
            Fate::FailDownload => None,
            fate => Some(FakeLightcurve::new(sector, config.cutout_size, fate)),
        }
    }
}

/// A config matched to the synthetic source's grid size.
pub fn test_config(name: &str) -> EnsembleConfig {
    let mut config = EnsembleConfig::new(
        Radius::Degrees(0.08),
        ClusterAge::LogYears(9.1),
        Some(name.to_string()),
        None,
    )
    .unwrap();
    config.cutout_size = GRID;
    config
}
