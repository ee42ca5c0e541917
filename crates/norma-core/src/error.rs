use crate::dtype::DType;

/// Errors raised by norma tensors and kernels.
///
/// Every kernel validates its operands before touching data, so an error
/// always means no output was produced.
#[derive(Debug, thiserror::Error)]
pub enum NormaError {
    #[error(
        "Expected normalized_shape to be at least 1-dimensional with positive sizes, \
         but got normalized_shape={normalized_shape:?}"
    )]
    InvalidNormalizedShape { normalized_shape: Vec<usize> },

    #[error(
        "Given normalized_shape={normalized_shape:?}, expected input with shape [*{}], \
         but got input of size {input_shape:?}",
        trailing_pattern(.normalized_shape)
    )]
    ShapeMismatch {
        normalized_shape: Vec<usize>,
        input_shape: Vec<usize>,
    },

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Unsupported dtype: {0}")]
    UnsupportedDType(DType),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl NormaError {
    /// Shorthand for building a `PreconditionViolation`.
    pub fn precondition(msg: impl Into<String>) -> Self {
        NormaError::PreconditionViolation(msg.into())
    }
}

fn trailing_pattern(dims: &[usize]) -> String {
    dims.iter().map(|d| format!(", {d}")).collect()
}
