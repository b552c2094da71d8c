use thiserror::Error;

/// Failures of the regression solvers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinRegError {
    /// The design matrix has no rows
    #[error("cannot fit on an empty dataset")]
    EmptyDataset,

    /// The ridge parameter is negative, NaN or infinite
    #[error("invalid regularization strength: {0}")]
    InvalidLambda(f64),

    /// A matrix that has to be inverted is singular
    #[error("matrix is not invertible")]
    SingularMatrix,

    /// The inputs disagree on their dimensions
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Length implied by the design matrix
        expected: usize,
        /// Length actually supplied
        got: usize,
    },
}
