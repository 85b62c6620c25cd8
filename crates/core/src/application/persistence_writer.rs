// Persistence Writer - single consumer of the estimator outbox
//
// Applies change batches to the token repository in the order they were
// committed. A failed batch is retried as a whole: inserts are upserts and
// updates/deletes overwrite, so replaying a batch is harmless.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::application::queue::{OutboxBatch, OutboxReceiver};
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::application::shutdown::ShutdownToken;
use crate::domain::QueueEvent;
use crate::error::Result;
use crate::port::TokenRepository;

pub struct PersistenceWriter {
    repo: Arc<dyn TokenRepository>,
    retry: RetryPolicy,
    outbox: OutboxReceiver,
}

impl PersistenceWriter {
    pub fn new(repo: Arc<dyn TokenRepository>, retry: RetryPolicy, outbox: OutboxReceiver) -> Self {
        Self {
            repo,
            retry,
            outbox,
        }
    }

    /// Drain the outbox until shutdown; batches already queued are still written
    pub async fn run(mut self, mut shutdown: ShutdownToken) {
        info!(
            max_attempts = self.retry.max_attempts(),
            "Persistence writer started"
        );

        loop {
            tokio::select! {
                biased;
                batch = self.outbox.recv() => match batch {
                    Some(batch) => self.process(batch).await,
                    None => break,
                },
                _ = shutdown.wait() => {
                    let mut drained = 0;
                    while let Ok(batch) = self.outbox.try_recv() {
                        self.process(batch).await;
                        drained += 1;
                    }
                    info!(drained, "Persistence writer flushed pending batches");
                    break;
                }
            }
        }

        info!("Persistence writer stopped");
    }

    async fn process(&self, batch: OutboxBatch) {
        let outcome = self.apply_with_retry(&batch.events).await;
        if let Err(e) = &outcome {
            error!(
                error = %e,
                events = batch.events.len(),
                "Giving up on change batch; in-memory queue is unaffected"
            );
        }
        batch.acknowledge(outcome.map_err(|e| e.to_string()));
    }

    async fn apply_with_retry(&self, events: &[QueueEvent]) -> Result<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match self.apply(events).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            match self.retry.decide(attempts) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        error = %err,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Change batch write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(err),
            }
        }
    }

    async fn apply(&self, events: &[QueueEvent]) -> Result<()> {
        for event in events {
            match event {
                QueueEvent::Issued { token } => self.repo.insert(token).await?,
                QueueEvent::Updated {
                    token_id, fields, ..
                } => self.repo.update_fields(token_id, fields).await?,
                QueueEvent::Removed { token_id, .. } => self.repo.delete(token_id).await?,
            }
            debug!(token_id = %event.token_id(), "Change persisted");
        }
        Ok(())
    }
}
