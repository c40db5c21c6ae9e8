//! Unbounded FIFO hand-off between intake and the worker pool

use crate::error::{JobError, JobResult};
use crate::types::Job;
use async_channel::{Receiver, Sender};

/// Multi-producer, multi-consumer job queue
///
/// Jobs come out in the order they went in, and every job is delivered to
/// exactly one consumer. Enqueueing never waits and never rejects until the
/// queue is closed.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::unbounded();
        Self { sender, receiver }
    }

    /// Append a job
    ///
    /// # Errors
    ///
    /// Returns [`JobError::QueueClosed`] after [`close`](Self::close).
    pub fn enqueue(&self, job: Job) -> JobResult<()> {
        self.sender.try_send(job).map_err(|_| JobError::QueueClosed)
    }

    /// Wait for the next job
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<Job> {
        self.receiver.recv().await.ok()
    }

    /// Jobs waiting to be picked up
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether no job is waiting
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Stop accepting jobs; waiting consumers drain what is left
    pub fn close(&self) -> bool {
        self.sender.close()
    }

    /// Whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
