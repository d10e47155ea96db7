use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced by the ensemble pipeline.
///
/// Quality-gate outcomes (failed download, edge proximity, scattered light)
/// are **not** errors: they are expected, counted outcomes of the domain and
/// travel through [`EnsembleRunState`](crate::ensemble::EnsembleRunState).
/// Only configuration-contract violations and artifact-format violations are
/// modeled here.
#[derive(Error, Debug)]
pub enum EnsembleError {
    #[error("Must provide at least one of cluster name and location")]
    MissingIdentifier,

    #[error("Output folder does not exist: {0}")]
    MissingOutputFolder(Utf8PathBuf),

    #[error("No corrected lightcurve artifact at: {0}")]
    ArtifactNotFound(Utf8PathBuf),

    #[error("Malformed lightcurve artifact: {0}")]
    MalformedArtifact(String),

    #[error("Plane fit failed: {0}")]
    PlaneFitFailed(String),

    #[error("Residual stack is empty")]
    EmptyResidualStack,

    #[error("Quality cube has {cube} frames but the model has {model}")]
    CubeModelMismatch { cube: usize, model: usize },

    #[error("Pixel frame shape {got_rows}x{got_cols} does not match grid size {expected}")]
    FrameShapeMismatch {
        expected: usize,
        got_rows: usize,
        got_cols: usize,
    },

    #[error("Plot rendering failed: {0}")]
    PlotFailed(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Artifact (de)serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
}
