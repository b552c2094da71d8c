//! Learn, cross validate and predict for stored models.
//!
//! Storage is injected through the [`ModelStore`] trait, retraining can be
//! deferred onto a bounded [`LearnQueue`] drained by a single worker.

#![warn(missing_docs)]

#[macro_use]
extern crate log;

mod error;
mod learner;
mod queue;
mod store;

pub use error::{ServiceError, ServiceResult};
pub use learner::{LearnParams, LearnReport, Learner, Prediction};
pub use queue::{EnqueueOutcome, LearnQueue, QueueFull, DEFAULT_CAPACITY};
pub use store::{MemoryStore, ModelStore};
