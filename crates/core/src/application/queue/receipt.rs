// Mutation receipts and persistence acknowledgements

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::domain::QueueEvent;
use crate::error::{AppError, Result};

/// Change batch handed to the persistence writer
#[derive(Debug)]
pub struct OutboxBatch {
    pub events: Vec<QueueEvent>,
    pub(crate) ack: oneshot::Sender<std::result::Result<(), String>>,
}

impl OutboxBatch {
    pub fn new(events: Vec<QueueEvent>) -> (Self, PersistAck) {
        let (tx, rx) = oneshot::channel();
        (Self { events, ack: tx }, PersistAck { rx: Some(rx) })
    }

    /// Report the write outcome to whoever holds the matching `PersistAck`
    pub fn acknowledge(self, outcome: std::result::Result<(), String>) {
        let _ = self.ack.send(outcome);
    }
}

pub type OutboxSender = mpsc::UnboundedSender<OutboxBatch>;
pub type OutboxReceiver = mpsc::UnboundedReceiver<OutboxBatch>;

/// Create the channel between the estimator and the persistence writer
pub fn outbox_channel() -> (OutboxSender, OutboxReceiver) {
    mpsc::unbounded_channel()
}

/// Outcome of waiting for durability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
    Persisted,
    /// The write failed after retries; the in-memory change still stands
    Failed(String),
    /// Still in flight when the caller stopped waiting
    Pending,
}

impl PersistStatus {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistStatus::Persisted)
    }

    /// Non-blocking warning for the user, if any
    pub fn warning(&self) -> Option<String> {
        match self {
            PersistStatus::Persisted => None,
            PersistStatus::Failed(reason) => {
                Some(format!("Change applied but may not be saved: {}", reason))
            }
            PersistStatus::Pending => Some("Change applied, save still in progress".to_string()),
        }
    }
}

/// Awaitable durability confirmation for one mutation
#[derive(Debug)]
pub struct PersistAck {
    rx: Option<oneshot::Receiver<std::result::Result<(), String>>>,
}

impl PersistAck {
    /// Nothing to persist (no change, or no persistence configured)
    pub fn done() -> Self {
        Self { rx: None }
    }

    /// Wait until the persistence writer has applied the batch
    pub async fn wait(self) -> Result<()> {
        let Some(rx) = self.rx else {
            return Ok(());
        };
        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(AppError::PersistenceUnavailable(reason)),
            Err(_) => Err(AppError::PersistenceUnavailable(
                "persistence writer stopped before acknowledging".to_string(),
            )),
        }
    }

    pub async fn wait_timeout(self, timeout: Duration) -> PersistStatus {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(Ok(())) => PersistStatus::Persisted,
            Ok(Err(e)) => PersistStatus::Failed(e.to_string()),
            Err(_) => PersistStatus::Pending,
        }
    }
}

/// Result of a committed mutation plus its durability handle
#[derive(Debug)]
pub struct Receipt<T> {
    pub value: T,
    pub ack: PersistAck,
}

impl<T> Receipt<T> {
    pub fn into_parts(self) -> (T, PersistAck) {
        (self.value, self.ack)
    }

    /// Drop the ack; durability is not awaited
    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_done_ack_resolves_immediately() {
        assert!(PersistAck::done().wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_ack_reports_persistence_unavailable() {
        let (batch, ack) = OutboxBatch::new(vec![]);
        batch.acknowledge(Err("disk full".to_string()));
        let err = ack.wait().await.unwrap_err();
        assert!(matches!(err, AppError::PersistenceUnavailable(msg) if msg == "disk full"));
    }

    #[tokio::test]
    async fn test_dropped_batch_reports_failure() {
        let (batch, ack) = OutboxBatch::new(vec![]);
        drop(batch);
        assert!(ack.wait().await.is_err());
    }

    #[tokio::test]
    async fn test_wait_timeout_pending() {
        let (_batch, ack) = OutboxBatch::new(vec![]);
        let status = ack.wait_timeout(Duration::from_millis(10)).await;
        assert_eq!(status, PersistStatus::Pending);
        assert!(status.warning().is_some());
    }
}
