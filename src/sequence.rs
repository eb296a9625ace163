//! Serialized execution queue
//!
//! A [`Sequence`] runs submitted units one at a time, in the order they were
//! enqueued, on a single worker task. Callers get each unit's result back
//! through [`Sequence::add_and_promise`]. A unit that panics is reported to
//! its caller and the worker moves on to the next one.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

type Unit = BoxFuture<'static, ()>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Sequence {0} is closed")]
    Closed(String),
    #[error("Unit in sequence {0} panicked")]
    Panicked(String),
}

/// Handle to a serialized queue; clones share the same worker
#[derive(Debug, Clone)]
pub struct Sequence {
    name: Arc<str>,
    sender: mpsc::UnboundedSender<Unit>,
    pending: Arc<AtomicUsize>,
}

impl Sequence {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn new(name: &str) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Unit>();
        let worker = name.to_string();
        tokio::spawn(async move {
            while let Some(unit) = receiver.recv().await {
                unit.await;
            }
            log::debug!("Sequence {} stopped", worker);
        });

        Self {
            name: Arc::from(name),
            sender,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units enqueued or running
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Enqueue `work` and wait for its result
    pub async fn add_and_promise<F, T>(&self, work: F) -> Result<T, SequenceError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done, result) = oneshot::channel();
        let pending = self.pending.clone();
        let unit = async move {
            let outcome = AssertUnwindSafe(work).catch_unwind().await;
            pending.fetch_sub(1, Ordering::SeqCst);
            let _ = done.send(outcome);
        }
        .boxed();

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(unit).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(SequenceError::Closed(self.name.to_string()));
        }

        match result.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => {
                log::error!("Unit in sequence {} panicked", self.name);
                Err(SequenceError::Panicked(self.name.to_string()))
            }
            Err(_) => Err(SequenceError::Closed(self.name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_returns_unit_result() {
        let sequence = Sequence::new("test");
        let value = sequence.add_and_promise(async { 40 + 2 }).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(sequence.pending(), 0);
    }

    #[tokio::test]
    async fn test_units_run_in_order_without_overlap() {
        let sequence = Sequence::new("balances");
        let log = Arc::new(Mutex::new(Vec::new()));

        let slow = {
            let log = log.clone();
            sequence.add_and_promise(async move {
                log.lock().unwrap().push("slow:start");
                tokio::time::sleep(Duration::from_millis(50)).await;
                log.lock().unwrap().push("slow:end");
            })
        };
        let fast = {
            let log = log.clone();
            sequence.add_and_promise(async move {
                log.lock().unwrap().push("fast:start");
                log.lock().unwrap().push("fast:end");
            })
        };

        let (a, b) = tokio::join!(slow, fast);
        a.unwrap();
        b.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["slow:start", "slow:end", "fast:start", "fast:end"]
        );
    }

    #[tokio::test]
    async fn test_panicking_unit_does_not_stop_worker() {
        let sequence = Sequence::new("test");
        let err = sequence
            .add_and_promise(async { panic!("boom") })
            .await
            .unwrap_err();
        assert_eq!(err, SequenceError::Panicked("test".to_string()));

        assert_eq!(sequence.add_and_promise(async { 1 }).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_worker() {
        let sequence = Sequence::new("shared");
        let other = sequence.clone();
        assert_eq!(other.name(), "shared");
        assert_eq!(other.add_and_promise(async { "ok" }).await.unwrap(), "ok");
    }
}
