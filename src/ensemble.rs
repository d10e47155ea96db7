//! # Ensemble pipeline orchestrator
//!
//! This module defines [`EnsembleLightcurves`], the façade that drives the
//! quality-gated loop over one sky location's candidate observations:
//!
//! 1. **Download gate** — ask the [`SectorSource`] for the observation's
//!    cutout; a failed search/download counts against `n_failed_download`.
//! 2. **Edge gate** — targets too close to the detector edge cannot get a
//!    uniform background subtraction and count against `n_near_edge`.
//! 3. **Scattered-light gate** — the correction runs unconditionally, then
//!    the [`ScatteredLightDetector`] inspects the residuals; contaminated
//!    observations count against `n_scattered_light`.
//!
//! Gate failures are counted domain outcomes, never errors. The exit policy
//! is position dependent: a failure on a non-last candidate skips to the
//! next index, a failure on the last candidate aborts the whole run. The
//! loop threads an explicit [`EnsembleRunState`] value and emits an explicit
//! [`GateSignal`] on each failure, so the asymmetric policy is testable in
//! isolation from any I/O.
//!
//! Each passing observation is stored and gets a best-effort diagnostic
//! plot. In `no_cache` mode the download cache is purged before every
//! download attempt and once more after the loop, trading re-download cost
//! for a bounded disk footprint.

use camino::Utf8Path;
use log::{info, warn};

use crate::config::{EnsembleConfig, OutputDirs};
use crate::errors::EnsembleError;
use crate::lightcurve::{CorrectedLightcurve, LightcurveRecord};
use crate::persistence::{access_lightcurve, ArtifactHeader, EnsembleArtifact};
use crate::plotting;
use crate::scattered_light::ScatteredLightDetector;

/// Discovery/download collaborator: an ordered list of candidate
/// observations for one sky location.
pub trait SectorSource {
    type Lightcurve: CorrectedLightcurve;

    /// Number of candidate observations found by the discovery step.
    fn sectors_available(&self) -> usize;

    /// Download the cutout for one candidate and wrap it in the correction
    /// adapter, built with the pipeline's cutout size, percentile, PCA
    /// component count, and progress flag. `None` signals a search or
    /// download failure.
    fn download(
        &mut self,
        sector: usize,
        config: &EnsembleConfig,
        cache_dir: Option<&Utf8Path>,
    ) -> Option<Self::Lightcurve>;
}

/// Which quality gate an observation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFailure {
    Download,
    NearEdge,
    ScatteredLight,
}

impl GateFailure {
    fn describe(&self) -> &'static str {
        match self {
            GateFailure::Download => "failed download",
            GateFailure::NearEdge => "failed near-edge test",
            GateFailure::ScatteredLight => "failed scattered-light test",
        }
    }
}

/// Control signal after a gate failure: keep iterating, or abort the run
/// because the failing candidate was the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    Continue,
    Abort(GateFailure),
}

/// The aggregate outcome of one pipeline run.
///
/// The lightcurve collection is sparse during processing (failed slots stay
/// empty) and is densified only when persisted.
#[derive(Debug, Clone, Default)]
pub struct EnsembleRunState {
    pub sectors_available: usize,
    pub n_good_obs: u32,
    pub n_failed_download: u32,
    pub n_near_edge: u32,
    pub n_scattered_light: u32,
    pub lightcurves: Vec<Option<LightcurveRecord>>,
}

impl EnsembleRunState {
    pub fn new(sectors_available: usize) -> Self {
        EnsembleRunState {
            sectors_available,
            lightcurves: vec![None; sectors_available],
            ..Default::default()
        }
    }

    /// Count a gate failure and decide whether the run continues.
    ///
    /// A failure on any candidate but the last skips that candidate; a
    /// failure on the last candidate aborts the whole run without evaluating
    /// its remaining gates.
    pub fn record_failure(&mut self, failure: GateFailure, is_last: bool) -> GateSignal {
        match failure {
            GateFailure::Download => self.n_failed_download += 1,
            GateFailure::NearEdge => self.n_near_edge += 1,
            GateFailure::ScatteredLight => self.n_scattered_light += 1,
        }
        if is_last {
            GateSignal::Abort(failure)
        } else {
            GateSignal::Continue
        }
    }

    pub fn record_success(&mut self, sector: usize, record: LightcurveRecord) {
        self.n_good_obs += 1;
        self.lightcurves[sector] = Some(record);
    }

    /// Indices of the candidates that passed every gate.
    pub fn good_sectors(&self) -> Vec<usize> {
        self.lightcurves
            .iter()
            .enumerate()
            .filter_map(|(i, lc)| lc.as_ref().map(|_| i))
            .collect()
    }

    /// Densify the surviving records in candidate order.
    pub fn into_records(self) -> Vec<LightcurveRecord> {
        self.lightcurves.into_iter().flatten().collect()
    }

    /// Every terminal fate is counted at most once per candidate.
    pub fn fates_accounted(&self) -> bool {
        (self.n_good_obs + self.n_failed_download + self.n_near_edge + self.n_scattered_light)
            as usize
            <= self.sectors_available
    }
}

/// The quality-gated ensemble pipeline for one sky location.
pub struct EnsembleLightcurves<S: SectorSource> {
    config: EnsembleConfig,
    dirs: OutputDirs,
    detector: ScatteredLightDetector,
    source: S,
    identifier: String,
}

impl<S: SectorSource> EnsembleLightcurves<S> {
    /// Wire a configured pipeline to its observation source.
    ///
    /// Resolves the output tree per the configured directory policy and
    /// builds the scattered-light detector for the configured cutout size
    /// and stride.
    ///
    /// Return
    /// ----------
    /// * The pipeline, or an [`EnsembleError`] on a configuration-contract
    ///   violation (missing identifier, missing output directory under
    ///   [`DirectoryPolicy::Fail`](crate::config::DirectoryPolicy::Fail)).
    pub fn new(config: EnsembleConfig, source: S) -> Result<Self, EnsembleError> {
        let identifier = config.identifier()?.to_string();
        let dirs = OutputDirs::resolve(&config)?;
        let detector = ScatteredLightDetector::new(
            config.cutout_size,
            config.scattered_light_stride,
            config.debug,
        );
        Ok(EnsembleLightcurves {
            config,
            dirs,
            detector,
            source,
            identifier,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Execute the gated loop over all candidate observations.
    ///
    /// Return
    /// ----------
    /// * The final [`EnsembleRunState`]: counters plus the sparse collection
    ///   of surviving lightcurves.
    pub fn run(&mut self) -> Result<EnsembleRunState, EnsembleError> {
        let sectors_available = self.source.sectors_available();
        let mut state = EnsembleRunState::new(sectors_available);
        self.note(&format!(
            "{} has {sectors_available} observations",
            self.identifier
        ));

        'sectors: for sector in 0..sectors_available {
            let is_last = sector + 1 == sectors_available;
            self.note(&format!("starting quality tests for observation {sector}"));

            // fresh-download-each-time policy
            if self.config.no_cache {
                self.clear_cache()?;
            }

            let downloaded =
                self.source
                    .download(sector, &self.config, self.dirs.cache.as_deref());
            let Some(mut lc) = downloaded else {
                match self.fail(&mut state, GateFailure::Download, sector, is_last) {
                    GateSignal::Continue => continue 'sectors,
                    GateSignal::Abort(_) => break 'sectors,
                }
            };

            if lc.near_edge() {
                match self.fail(&mut state, GateFailure::NearEdge, sector, is_last) {
                    GateSignal::Continue => continue 'sectors,
                    GateSignal::Abort(_) => break 'sectors,
                }
            }

            lc.correct()?;

            let contaminated = self
                .detector
                .detect(lc.quality_cube(), lc.normalized_full_model())?;
            if contaminated {
                match self.fail(&mut state, GateFailure::ScatteredLight, sector, is_last) {
                    GateSignal::Continue => continue 'sectors,
                    GateSignal::Abort(_) => break 'sectors,
                }
            }

            self.note(&format!("observation {sector} passed quality tests"));
            let record = lc.to_record(sector);
            self.plot_observation(sector, &record);
            state.record_success(sector, record);
        }

        // final purge once the run is over (loop exit or abort)
        if self.config.no_cache {
            self.clear_cache()?;
        }
        debug_assert!(state.fates_accounted());
        Ok(state)
    }

    /// Produce the persisted summary artifact for this location.
    ///
    /// If the location was already persisted, the existing artifact is read
    /// back and returned without re-running anything. Otherwise the pipeline
    /// runs, the surviving records are densified, and the artifact is
    /// written once — or only returned, when no output location is
    /// configured.
    pub fn summary_file(&mut self) -> Result<EnsembleArtifact, EnsembleError> {
        if let Some(dir) = self.dirs.lcs.clone() {
            let path = EnsembleArtifact::path_for(&dir, &self.identifier);
            if let Some(existing) = EnsembleArtifact::read_if_exists(&path)? {
                self.note(&format!(
                    "{} already has a persisted artifact, returning it",
                    self.identifier
                ));
                return Ok(existing);
            }
        }

        let state = self.run()?;
        let artifact = EnsembleArtifact {
            header: self.header(&state),
            lightcurves: state.into_records(),
        };
        if let Some(dir) = &self.dirs.lcs {
            artifact.write(&EnsembleArtifact::path_for(dir, &self.identifier))?;
        }
        Ok(artifact)
    }

    /// Whether this location already has a persisted artifact.
    pub fn previously_saved(&self) -> bool {
        self.dirs
            .lcs
            .as_deref()
            .map(|dir| EnsembleArtifact::path_for(dir, &self.identifier).is_file())
            .unwrap_or(false)
    }

    /// Look up one stored good observation by 1-based index, rendering its
    /// diagnostic plot. See [`access_lightcurve`].
    pub fn access_lightcurve(
        &self,
        observation: usize,
    ) -> Result<Option<LightcurveRecord>, EnsembleError> {
        let Some(dir) = self.dirs.lcs.as_deref() else {
            warn!("no output location configured, nothing to access");
            return Ok(None);
        };
        access_lightcurve(dir, self.dirs.figures.as_deref(), &self.identifier, observation)
    }

    fn header(&self, state: &EnsembleRunState) -> ArtifactHeader {
        ArtifactHeader {
            name: self.config.cluster_name.clone(),
            location: self.config.location.clone(),
            radius_deg: self.config.radius.as_degrees(),
            log_age: self.config.age.as_log_years(),
            has_data: state.sectors_available > 0,
            n_obs_available: state.sectors_available,
            n_good_obs: state.n_good_obs,
            n_failed_download: state.n_failed_download,
            n_near_edge: state.n_near_edge,
            n_scattered_light: state.n_scattered_light,
        }
    }

    fn fail(
        &self,
        state: &mut EnsembleRunState,
        failure: GateFailure,
        sector: usize,
        is_last: bool,
    ) -> GateSignal {
        self.note(&format!("observation {sector} {}", failure.describe()));
        state.record_failure(failure, is_last)
    }

    /// Best-effort diagnostic plot of a passing observation.
    fn plot_observation(&self, sector: usize, record: &LightcurveRecord) {
        let Some(dir) = self.dirs.figures.as_deref() else {
            return;
        };
        let figure = plotting::figure_path(dir, &self.identifier, sector);
        if let Err(e) = plotting::plot_lightcurve(
            &figure,
            &format!("Observation: {sector}"),
            &self.identifier,
            &record.series,
        ) {
            warn!("could not render diagnostic plot for observation {sector}: {e}");
        }
    }

    /// Delete cached download files, leaving the cache directory in place.
    fn clear_cache(&self) -> Result<(), EnsembleError> {
        let Some(cache) = self.dirs.cache.as_deref() else {
            return Ok(());
        };
        for entry in cache.read_dir_utf8()? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path().as_std_path())?;
            }
        }
        Ok(())
    }

    fn note(&self, msg: &str) {
        if self.config.verbose {
            info!("{msg}");
        }
    }
}
