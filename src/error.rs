use thiserror::Error;

/// Errors raised by the synthesis pipeline.
#[derive(Debug, Error)]
pub enum VocoderError {
    #[error("Unsupported batch size {batch}: expected one of {supported:?}")]
    InvalidBatchSize { batch: usize, supported: Vec<usize> },

    #[error("Shape mismatch for `{tensor}`: expected {expected}, got {actual:?}")]
    ShapeMismatch {
        tensor: String,
        expected: String,
        actual: Vec<usize>,
    },

    #[error("Mel sequence has no frames")]
    EmptyMel,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Executor(#[from] anyhow::Error),
}

impl VocoderError {
    pub fn shape(tensor: &str, expected: impl Into<String>, actual: &[usize]) -> Self {
        VocoderError::ShapeMismatch {
            tensor: tensor.to_string(),
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VocoderError>;
