//! Bounded retrain queue, drained by a single worker thread

use std::{
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use crossbeam::channel::{bounded, Sender, TrySendError};
use thiserror::Error;

use crate::{Learner, ModelStore, ServiceError, ServiceResult};

/// Default capacity of the retrain queue
pub const DEFAULT_CAPACITY: usize = 1000;

/// The retrain queue has no room left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("retrain queue is full ({capacity} models pending)")]
pub struct QueueFull {
    /// Maximum number of pending model ids
    pub capacity: usize,
}

/// What happened to a model id handed to [`LearnQueue::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Queued behind the already pending ids
    Enqueued,
    /// The id is already pending and has not started yet, it will be learned once
    Coalesced,
    /// Dropped because the queue is full
    Rejected(QueueFull),
    /// Dropped because the queue was closed or its worker is gone
    Closed,
}

/// A bounded FIFO of model ids with a single consumer, so at most one learn
/// runs at a time. Producers never block: a full queue rejects the id.
pub struct LearnQueue {
    sender: Option<Sender<String>>,
    pending: Arc<Mutex<HashSet<String>>>,
    worker: Option<JoinHandle<()>>,
    capacity: usize,
}

impl LearnQueue {
    /// Start the worker, calling `handler` for every dequeued model id.
    /// A panicking handler is logged and the worker moves on to the next id.
    pub fn spawn<F>(capacity: usize, mut handler: F) -> ServiceResult<Self>
    where
        F: FnMut(&str) + Send + 'static,
    {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded::<String>(capacity);
        let pending: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        let worker_pending = pending.clone();
        let worker = thread::Builder::new()
            .name("learn-queue".to_string())
            .spawn(move || {
                while let Ok(model_id) = receiver.recv() {
                    worker_pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&model_id);

                    if panic::catch_unwind(AssertUnwindSafe(|| handler(&model_id))).is_err() {
                        error!("learn job for model {} panicked", model_id);
                    }
                }
                info!("learn queue closed, worker exiting");
            })
            .map_err(|e| ServiceError::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            sender: Some(sender),
            pending,
            worker: Some(worker),
            capacity,
        })
    }

    /// Start a worker that learns every dequeued model with `learner`.
    /// Failed learns are logged, the model keeps its previous coefficients.
    pub fn for_learner<S>(capacity: usize, learner: Learner<S>) -> ServiceResult<Self>
    where
        S: ModelStore + 'static,
    {
        Self::spawn(capacity, move |model_id| {
            if let Err(e) = learner.learn(model_id) {
                warn!("learn of model {} failed: {}", model_id, e);
            }
        })
    }

    /// Queue a model for retraining
    pub fn enqueue(&self, model_id: &str) -> EnqueueOutcome {
        let Some(sender) = self.sender.as_ref() else {
            debug!("learn queue closed, dropping model {}", model_id);
            return EnqueueOutcome::Closed;
        };

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.contains(model_id) {
            debug!("model {} already queued", model_id);
            return EnqueueOutcome::Coalesced;
        }
        match sender.try_send(model_id.to_string()) {
            Ok(()) => {
                pending.insert(model_id.to_string());
                EnqueueOutcome::Enqueued
            }
            Err(TrySendError::Full(_)) => {
                warn!("retrain queue full, rejecting model {}", model_id);
                EnqueueOutcome::Rejected(QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("learn worker gone, dropping model {}", model_id);
                EnqueueOutcome::Closed
            }
        }
    }

    /// Number of model ids waiting to be learned
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Maximum number of pending model ids
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting ids, learn everything still pending and join the worker
    pub fn shutdown(mut self) {
        self.close();
    }

    /// Like [`LearnQueue::shutdown`], but keeps the queue around.
    /// Later ids are answered with [`EnqueueOutcome::Closed`].
    pub fn close(&mut self) {
        // dropping the only sender lets the worker drain the channel and exit
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("learn worker panicked");
            }
        }
    }
}

impl Drop for LearnQueue {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use common::ModelType;
    use crossbeam::channel::unbounded;

    use super::*;
    use crate::{LearnParams, MemoryStore};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&str) + Send + 'static) {
        let seen = Arc::new(Mutex::new(vec![]));
        let s = seen.clone();
        (seen, move |id: &str| s.lock().unwrap().push(id.to_string()))
    }

    #[test]
    fn processes_in_fifo_order() {
        if let Err(_) = pretty_env_logger::try_init() {}

        let (seen, handler) = recorder();
        let queue = LearnQueue::spawn(DEFAULT_CAPACITY, handler).unwrap();
        for id in ["a", "b", "c"] {
            assert_eq!(queue.enqueue(id), EnqueueOutcome::Enqueued);
        }
        queue.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn coalesces_and_rejects_while_busy() {
        let (started_s, started_r) = unbounded::<String>();
        let (gate_s, gate_r) = unbounded::<()>();
        let seen = Arc::new(Mutex::new(vec![]));
        let s = seen.clone();
        let queue = LearnQueue::spawn(1, move |id: &str| {
            started_s.send(id.to_string()).unwrap();
            // blocks until the gate is dropped
            let _ = gate_r.recv();
            s.lock().unwrap().push(id.to_string());
        })
        .unwrap();

        assert_eq!(queue.enqueue("a"), EnqueueOutcome::Enqueued);
        assert_eq!(started_r.recv().unwrap(), "a");
        assert_eq!(queue.pending(), 0);

        assert_eq!(queue.enqueue("b"), EnqueueOutcome::Enqueued);
        assert_eq!(queue.enqueue("b"), EnqueueOutcome::Coalesced);
        assert_eq!(
            queue.enqueue("c"),
            EnqueueOutcome::Rejected(QueueFull {
                capacity: 1
            })
        );
        assert_eq!(queue.pending(), 1);

        drop(gate_s);
        queue.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn survives_panicking_jobs() {
        let (seen, mut record) = recorder();
        let queue = LearnQueue::spawn(4, move |id: &str| {
            if id == "boom" {
                panic!("job failed");
            }
            record(id);
        })
        .unwrap();

        queue.enqueue("boom");
        queue.enqueue("fine");
        queue.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec!["fine"]);
    }

    #[test]
    fn closed_queue_drops_ids() {
        let (seen, handler) = recorder();
        let mut queue = LearnQueue::spawn(4, handler).unwrap();
        assert_eq!(queue.enqueue("a"), EnqueueOutcome::Enqueued);

        queue.close();
        assert_eq!(queue.enqueue("b"), EnqueueOutcome::Closed);
        assert_eq!(queue.pending(), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn lost_worker_is_not_a_full_queue() {
        let (sender, receiver) = bounded::<String>(1);
        drop(receiver);
        let queue = LearnQueue {
            sender: Some(sender),
            pending: Arc::new(Mutex::new(HashSet::new())),
            worker: None,
            capacity: 1,
        };

        assert_eq!(queue.enqueue("a"), EnqueueOutcome::Closed);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let (_, handler) = recorder();
        let queue = LearnQueue::spawn(0, handler).unwrap();
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn retrains_stored_models() {
        let store = Arc::new(MemoryStore::new());
        let labels = vec!["x".to_string()];
        let model = store.create_model(ModelType::Linear, &labels, 0.0).unwrap();
        for x in 1..5 {
            let x = x as f64;
            let covariates: HashMap<String, f64> = [("x".to_string(), x)].into_iter().collect();
            store.add_datum(&model.id, 4.0 * x, covariates).unwrap();
        }
        let learner = Learner::new(store.clone(), LearnParams::default());

        let queue = LearnQueue::for_learner(DEFAULT_CAPACITY, learner).unwrap();
        queue.enqueue(&model.id);
        queue.enqueue("unknown");
        queue.shutdown();

        let stored = store.get_model(&model.id).unwrap();
        assert!((stored.coefficients[0].value - 4.0).abs() < 1e-9);
        assert!(stored.train_rmse.is_some());
    }
}
