//! # Pipeline configuration
//!
//! This module defines [`EnsembleConfig`], the explicit configuration
//! surface of the ensemble pipeline, together with the unit-carrying input
//! types ([`Radius`], [`ClusterAge`]) and the non-interactive directory
//! policy ([`DirectoryPolicy`]) that replaces any prompt-driven folder setup
//! in the calling layer.
//!
//! ## Overview
//!
//! - All options have documented defaults; only the radius, the age, and an
//!   identifier (name and/or location) are mandatory.
//! - Construction validates the identifier contract immediately: a config
//!   with neither name nor location is rejected with
//!   [`EnsembleError::MissingIdentifier`].
//! - Output directories are resolved once, before the pipeline runs, through
//!   [`OutputDirs::resolve`]. An absent output path disables persistence and
//!   plotting entirely.

use camino::{Utf8Path, Utf8PathBuf};

use crate::constants::{
    Degree, Dex, DEFAULT_CUTOUT_SIZE, DEFAULT_N_PCA, DEFAULT_PERCENTILE,
    DEFAULT_SCATTERED_LIGHT_STRIDE,
};
use crate::errors::EnsembleError;

/// Angular radius of the target region, convertible to degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Radius {
    Degrees(f64),
    Arcminutes(f64),
    Arcseconds(f64),
}

impl Radius {
    /// Convert to degrees, the unit used internally and in the artifact header.
    pub fn as_degrees(&self) -> Degree {
        match *self {
            Radius::Degrees(d) => d,
            Radius::Arcminutes(m) => m / 60.0,
            Radius::Arcseconds(s) => s / 3600.0,
        }
    }
}

/// Age of the target, convertible to log10(age / yr).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusterAge {
    /// Already logarithmic (dex)
    LogYears(f64),
    /// Linear age in years
    Years(f64),
}

impl ClusterAge {
    pub fn as_log_years(&self) -> Dex {
        match *self {
            ClusterAge::LogYears(dex) => dex,
            ClusterAge::Years(yr) => yr.log10(),
        }
    }
}

/// What to do when a required output directory is missing.
///
/// Replaces the interactive "create it for you?" prompt of earlier
/// incarnations of this pipeline: the decision is made up front by the
/// caller, never mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryPolicy {
    /// Create any missing directory
    #[default]
    Create,
    /// Fail construction with [`EnsembleError::MissingOutputFolder`]
    Fail,
    /// Silently disable saving for the missing directory
    Skip,
}

/// Configuration for one ensemble pipeline run.
///
/// # Fields
///
/// * `radius` - Angular radius of the target region
/// * `age` - Age of the target
/// * `output_path` - Root of the output tree; `None` disables persistence and plotting
/// * `cluster_name` - Identifying name; at least one of name and location is required
/// * `location` - Sky location string, used as the identifier when no name is given
/// * `percentile` - Percentile used in the corrector's upper-limit calculation
/// * `cutout_size` - Side length of the requested image cutout in pixels
/// * `scattered_light_stride` - Stride at which residual frames are sampled
/// * `n_pca` - Number of principal components used by the corrector
/// * `verbose` - Per-gate progress reporting
/// * `no_cache` - Purge cached downloads before each download and at run end
/// * `debug` - Disable the scattered-light detector entirely (testing escape hatch)
/// * `directory_policy` - Non-interactive policy for missing output directories
#[derive(Debug, Clone)]
pub struct EnsembleConfig {
    pub radius: Radius,
    pub age: ClusterAge,
    pub output_path: Option<Utf8PathBuf>,
    pub cluster_name: Option<String>,
    pub location: Option<String>,
    pub percentile: u32,
    pub cutout_size: usize,
    pub scattered_light_stride: usize,
    pub n_pca: usize,
    pub verbose: bool,
    pub no_cache: bool,
    pub debug: bool,
    pub directory_policy: DirectoryPolicy,
}

impl EnsembleConfig {
    /// Create a configuration with the documented defaults.
    ///
    /// Arguments
    /// -----------------
    /// * `radius`: angular radius of the target region.
    /// * `age`: age of the target.
    /// * `cluster_name`: identifying name, if any.
    /// * `location`: sky location string, if any.
    ///
    /// Return
    /// ----------
    /// * A new [`EnsembleConfig`], or [`EnsembleError::MissingIdentifier`] if
    ///   neither a name nor a location was supplied.
    pub fn new(
        radius: Radius,
        age: ClusterAge,
        cluster_name: Option<String>,
        location: Option<String>,
    ) -> Result<Self, EnsembleError> {
        if cluster_name.is_none() && location.is_none() {
            return Err(EnsembleError::MissingIdentifier);
        }
        Ok(EnsembleConfig {
            radius,
            age,
            output_path: None,
            cluster_name,
            location,
            percentile: DEFAULT_PERCENTILE,
            cutout_size: DEFAULT_CUTOUT_SIZE,
            scattered_light_stride: DEFAULT_SCATTERED_LIGHT_STRIDE,
            n_pca: DEFAULT_N_PCA,
            verbose: false,
            no_cache: false,
            debug: false,
            directory_policy: DirectoryPolicy::default(),
        })
    }

    /// Set the output root, keeping everything else as configured.
    pub fn with_output_path(mut self, output_path: impl Into<Utf8PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    /// The identifier used for artifact and figure names: the cluster name
    /// if present, otherwise the location string.
    pub fn identifier(&self) -> Result<&str, EnsembleError> {
        self.cluster_name
            .as_deref()
            .or(self.location.as_deref())
            .ok_or(EnsembleError::MissingIdentifier)
    }
}

/// Resolved output locations for one run.
///
/// Each entry is `None` when saving for that category is disabled, either
/// because no output root was configured or because a missing directory was
/// skipped under [`DirectoryPolicy::Skip`].
#[derive(Debug, Clone, Default)]
pub struct OutputDirs {
    /// Corrected-lightcurve artifacts
    pub lcs: Option<Utf8PathBuf>,
    /// Diagnostic figures
    pub figures: Option<Utf8PathBuf>,
    /// Manually managed download cache (only used in `no_cache` mode)
    pub cache: Option<Utf8PathBuf>,
}

impl OutputDirs {
    /// Resolve the output tree for `config` according to its directory policy.
    ///
    /// The subfolders are `corrected_lcs/`, `figures/lcs/`, and `cache/`
    /// under the configured output root. The cache folder is only resolved
    /// when `no_cache` mode is active.
    ///
    /// Return
    /// ----------
    /// * The resolved [`OutputDirs`], or [`EnsembleError::MissingOutputFolder`]
    ///   under [`DirectoryPolicy::Fail`] when a directory is absent.
    pub fn resolve(config: &EnsembleConfig) -> Result<Self, EnsembleError> {
        let Some(root) = config.output_path.as_deref() else {
            return Ok(OutputDirs::default());
        };

        let mut dirs = OutputDirs {
            lcs: resolve_dir(&root.join("corrected_lcs"), config.directory_policy)?,
            figures: resolve_dir(&root.join("figures").join("lcs"), config.directory_policy)?,
            cache: None,
        };
        if config.no_cache {
            dirs.cache = resolve_dir(&root.join("cache"), config.directory_policy)?;
        }
        Ok(dirs)
    }
}

fn resolve_dir(
    path: &Utf8Path,
    policy: DirectoryPolicy,
) -> Result<Option<Utf8PathBuf>, EnsembleError> {
    if path.is_dir() {
        return Ok(Some(path.to_owned()));
    }
    match policy {
        DirectoryPolicy::Create => {
            std::fs::create_dir_all(path)?;
            Ok(Some(path.to_owned()))
        }
        DirectoryPolicy::Fail => Err(EnsembleError::MissingOutputFolder(path.to_owned())),
        DirectoryPolicy::Skip => {
            log::warn!("output folder {path} does not exist, saving disabled for it");
            Ok(None)
        }
    }
}
