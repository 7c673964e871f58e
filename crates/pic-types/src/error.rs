use thiserror::Error;

#[derive(Error, Debug)]
pub enum PicError {
    /// BinIndex / cell-key bookkeeping is inconsistent. Fatal for the step.
    #[error("Bin invariant violated: {0}")]
    InvariantViolation(String),

    #[error(
        "Particle {particle} maps to cell index {index} on axis {axis}, outside [0, {length})"
    )]
    CellOutOfRange {
        particle: usize,
        axis: usize,
        index: i64,
        length: usize,
    },

    #[error("Stage '{stage}' failed in bin {bin}: {message}")]
    StageFailure {
        stage: String,
        bin: usize,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PicError {
    /// True for errors that leave the particle layout unusable.
    pub fn is_fatal_to_step(&self) -> bool {
        matches!(
            self,
            PicError::InvariantViolation(_)
                | PicError::CellOutOfRange { .. }
                | PicError::StageFailure { .. }
        )
    }
}

pub type PicResult<T> = Result<T, PicError>;
