//! services/api/src/study/mod.rs
//!
//! Workflows that combine the core state machines with the ports: a live test
//! that records itself as it goes, and the planner and flashcard operations.

pub mod flashcards;
pub mod planner;

pub use live_test::{LiveTest, SubmitOutcome};

use futures::future::BoxFuture;
use prep_core::{
    domain::{Flashcard, Subject},
    ports::{DocumentStore, PortError, PortResult},
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

/// A queued store write. Await it to learn the outcome, or drop it.
pub type WriteHandle = JoinHandle<PortResult<()>>;

struct QueuedWrite {
    what: String,
    write: BoxFuture<'static, PortResult<()>>,
    done: oneshot::Sender<PortResult<()>>,
}

/// Runs store writes on a background task, one at a time and in the order
/// they were queued. Failures are logged there, so callers that drop the
/// handle lose nothing but the error value.
#[derive(Clone)]
pub struct WriteQueue {
    sender: mpsc::UnboundedSender<QueuedWrite>,
}

impl WriteQueue {
    /// Starts the writer task. It drains the backlog and stops once every
    /// clone of the queue is dropped.
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<QueuedWrite>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let result = job.write.await;
                if let Err(e) = &result {
                    warn!("Background write of {} failed: {}", job.what, e);
                }
                // Nobody may be waiting.
                let _ = job.done.send(result);
            }
        });
        Self { sender }
    }

    pub fn enqueue<F>(&self, what: String, write: F) -> WriteHandle
    where
        F: Future<Output = PortResult<()>> + Send + 'static,
    {
        let (done, outcome) = oneshot::channel();
        let queued = self
            .sender
            .send(QueuedWrite {
                what,
                write: Box::pin(write),
                done,
            })
            .is_ok();
        tokio::spawn(async move {
            if !queued {
                return Err(PortError::Unexpected("the write queue has stopped".to_string()));
            }
            outcome.await.unwrap_or_else(|_| {
                Err(PortError::Unexpected("the write was dropped before it ran".to_string()))
            })
        })
    }

    /// Queues a write of `value` at `path`.
    pub fn write(&self, store: Arc<dyn DocumentStore>, path: String, value: Value) -> WriteHandle {
        self.enqueue(format!("'{}'", path), async move { store.write(&path, value).await })
    }
}

/// A stored value together with the key it lives under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithId<T> {
    pub id: String,
    #[serde(flatten)]
    pub value: T,
}

impl From<Flashcard> for WithId<Flashcard> {
    fn from(card: Flashcard) -> Self {
        Self {
            id: card.id.clone(),
            value: card,
        }
    }
}

impl From<Subject> for WithId<Subject> {
    fn from(subject: Subject) -> Self {
        Self {
            id: subject.id.clone(),
            value: subject,
        }
    }
}
