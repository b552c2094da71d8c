use lin_reg::LinRegError;
use thiserror::Error;

/// Result alias over the engine [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by the regression engine. None of them are retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// There are no training rows
    #[error("cannot fit on an empty dataset")]
    EmptyDataset,

    /// A required matrix inverse does not exist
    #[error("matrix is not invertible")]
    SingularMatrix,

    /// The ridge parameter is negative or not finite
    #[error("invalid regularization strength: {0}")]
    InvalidLambda(f64),

    /// The model type is neither `linear` nor `logistic`
    #[error("unknown model type: {0}")]
    UnknownModelType(String),

    /// Every fold of a cross validation failed to fit
    #[error("cross validation failed: none of the {folds} folds could be fit")]
    CvFailed {
        /// Number of folds attempted
        folds: usize,
    },

    /// Vectors or matrices disagree on their dimensions
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Length implied by the model or design
        expected: usize,
        /// Length actually supplied
        got: usize,
    },

    /// The fold count cannot partition the rows
    #[error("cannot split {rows} rows into {folds} folds")]
    InvalidFoldCount {
        /// Requested fold count
        folds: usize,
        /// Number of available rows
        rows: usize,
    },
}

impl From<LinRegError> for Error {
    fn from(err: LinRegError) -> Self {
        match err {
            LinRegError::EmptyDataset => Error::EmptyDataset,
            LinRegError::SingularMatrix => Error::SingularMatrix,
            LinRegError::InvalidLambda(lambda) => Error::InvalidLambda(lambda),
            LinRegError::DimensionMismatch { expected, got } => {
                Error::DimensionMismatch { expected, got }
            }
        }
    }
}
