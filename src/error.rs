use thiserror::Error;

/// Failures raised by a potential implementation itself.
#[derive(Debug, Error)]
pub enum PotentialError {
    #[error("structure contains no atoms")]
    EmptyStructure,

    #[error("species '{symbol}' is not supported by this potential")]
    UnsupportedSpecies { symbol: String },

    /// Internal numerical failure inside the model (e.g. inference
    /// divergence, unsupported geometry). Non-retryable within a step.
    #[error("potential evaluation failed: {0}")]
    Evaluation(#[from] anyhow::Error),
}

/// Crate-level error taxonomy.
///
/// Configuration-class variants (`InvalidSpec`, `PotentialUnavailable`,
/// `Potential` for species/empty-structure checks) surface before the step
/// loop starts. In-loop failures are recorded in the final run state as a
/// `Failed` termination reason instead of crossing the host boundary.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("shape mismatch: expected {expected} entries, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("invalid run specification: {0}")]
    InvalidSpec(String),

    #[error("potential '{0}' is not available")]
    PotentialUnavailable(String),

    #[error(transparent)]
    Potential(#[from] PotentialError),

    #[error("non-finite energy, force or position at step {step}")]
    NumericalDivergence { step: usize },

    #[error("failed to spawn run worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("run worker thread panicked")]
    WorkerPanicked,
}
