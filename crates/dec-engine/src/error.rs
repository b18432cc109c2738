use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    /// A run input failed shape or value validation. Reported during
    /// initialization; the loop never starts.
    #[error("invalid input '{input}': {message}")]
    InvalidArgument { input: String, message: String },
    /// A required run input was absent.
    #[error("required input '{0}' is missing")]
    MissingInput(String),
    /// The subgraph or a device operation failed mid-run. The run aborts
    /// with no partial output.
    #[error("backend error: {0}")]
    Backend(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] dec_tensor::TensorError),
    /// A programming-contract failure, fatal to the run.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
