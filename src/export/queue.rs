//! Bounded relay queue and completion signal
//!
//! The relay queue is the only structure shared by every scan worker and the
//! writer. It is a bounded multi-producer, single-consumer channel: producers
//! wait while it is full, the single consumer polls it with a timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{Result, SinkError};

use super::projector::OutputLine;

/// Create a relay queue with the given capacity
///
/// # Panics
/// Panics if `capacity` is zero. Callers validate the configured capacity
/// before building the pipeline.
pub fn relay_queue(capacity: usize) -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let high_water = Arc::new(AtomicUsize::new(0));

    let sender = RelaySender {
        tx,
        high_water: high_water.clone(),
    };
    let receiver = RelayReceiver { rx, high_water };

    (sender, receiver)
}

/// Producer handle of the relay queue
///
/// Clone one per scan worker. The consumer sees a disconnect once every
/// handle has been dropped.
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: mpsc::Sender<OutputLine>,
    high_water: Arc<AtomicUsize>,
}

impl RelaySender {
    /// Enqueue a line, waiting while the queue is full
    ///
    /// Never drops a line. Fails only when the consumer has gone away.
    pub async fn enqueue(&self, line: OutputLine) -> Result<()> {
        self.tx.send(line).await.map_err(|_| SinkError::Closed)?;
        self.high_water.fetch_max(self.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Number of lines currently buffered
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity of the queue
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Outcome of a single [`RelayReceiver::dequeue`] call
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued {
    /// A line arrived
    Line(OutputLine),

    /// Nothing arrived before the timeout
    TimedOut,

    /// Every producer handle is gone and the buffer is empty
    Disconnected,
}

/// Consumer handle of the relay queue
///
/// Not cloneable: the queue has exactly one consumer.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::Receiver<OutputLine>,
    high_water: Arc<AtomicUsize>,
}

impl RelayReceiver {
    /// Wait up to `timeout` for the next line
    ///
    /// A timeout is not an error; it is the point where the caller rechecks
    /// the completion signal.
    pub async fn dequeue(&mut self, timeout: Duration) -> Dequeued {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(line)) => Dequeued::Line(line),
            Ok(None) => Dequeued::Disconnected,
            Err(_) => Dequeued::TimedOut,
        }
    }

    /// Number of lines currently buffered
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Largest buffered size observed by producers after an enqueue
    pub fn high_water_mark(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }
}

/// One-shot flag marking that no producer will enqueue again
///
/// Written once by the coordinator after every worker has been joined, read
/// repeatedly by the writer. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    done: Arc<AtomicBool>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag
    ///
    /// # Returns
    /// * `bool` - True if this call set it, false if it was already set
    pub fn set(&self) -> bool {
        !self.done.swap(true, Ordering::Release)
    }

    pub fn is_set(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}
