use thiserror::Error;

/// Result alias over [`ServiceError`]
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures of the model service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// No model is stored under this id
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// No training row is stored under this id
    #[error("datum not found: {0}")]
    DatumNotFound(String),

    /// The training rows changed while a fit or cross validation was running,
    /// its result was discarded
    #[error("training data of model {model} changed during the computation (version {expected}, now {found})")]
    StaleData {
        /// Model id
        model: String,
        /// Data version the result was computed from
        expected: u64,
        /// Data version at the time of saving
        found: u64,
    },

    /// A covariate label was given more than once when creating a model
    #[error("duplicate covariate label: {0}")]
    DuplicateCovariate(String),

    /// A thread panicked while holding the store lock
    #[error("store lock poisoned")]
    StorePoisoned,

    /// The retrain worker thread could not be started
    #[error("failed to spawn learn worker: {0}")]
    WorkerSpawn(String),

    /// The regression engine failed
    #[error(transparent)]
    Engine(#[from] common::Error),
}
