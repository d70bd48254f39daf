use thiserror::Error;

/// Errors surfaced by the generation pipeline.
///
/// Per-feature problems (`DegenerateFeature`, `InternalGeometryFailure`) are
/// logged and the feature is skipped; they only appear as values inside the
/// layer processors. Structural problems (height field, terrain solid) abort
/// the whole pipeline. Every variant names the stage that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage}: invalid input: {reason}")]
    InvalidInput { stage: &'static str, reason: String },

    #[error("{stage}: elevation sampling failed: {reason}")]
    ElevationSample { stage: &'static str, reason: String },

    #[error("{stage}: height field has no valid elevation samples")]
    EmptyHeightField { stage: &'static str },

    #[error("{stage}: feature {feature} is degenerate: {reason}")]
    DegenerateFeature {
        stage: &'static str,
        feature: u64,
        reason: String,
    },

    #[error("{stage}: terrain base is not watertight after re-welding")]
    NonWatertightBase { stage: &'static str },

    #[error("{stage}: cancelled")]
    Cancelled { stage: &'static str },

    #[error("{stage}: geometry operation failed for feature {feature}: {reason}")]
    InternalGeometryFailure {
        stage: &'static str,
        feature: u64,
        reason: String,
    },
}

/// Failure reported by an [`crate::terrain::ElevationSource`] for a single
/// sample. Recovered by nearest-neighbor fill when possible.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ElevationError(pub String);
