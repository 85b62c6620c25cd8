// Startup recovery: rebuild in-memory queues from storage
use crate::application::queue::QueueEstimator;
use crate::port::TokenRepository;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub loaded: usize,
    pub restored: usize,
    /// Departments whose corrected estimates could not be written back
    pub unsaved_corrections: usize,
}

/// Recovery service
///
/// On daemon startup, reloads every stored token into the estimator so
/// numbering resumes where it stopped and positions reflect the stored
/// waiting set.
pub struct RecoveryService {
    token_repo: Arc<dyn TokenRepository>,
    estimator: Arc<QueueEstimator>,
}

impl RecoveryService {
    pub fn new(token_repo: Arc<dyn TokenRepository>, estimator: Arc<QueueEstimator>) -> Self {
        Self {
            token_repo,
            estimator,
        }
    }

    /// Algorithm:
    /// 1. Resume each department's numbering from its stored sequence mark
    /// 2. Load all stored tokens, oldest first
    /// 3. Re-insert them per department (unknown departments are skipped)
    /// 4. Recompute every department; corrected positions go back to storage
    ///
    /// Needs a running persistence writer when the estimator has an outbox.
    pub async fn recover(&self) -> crate::error::Result<RecoveryReport> {
        for (department_id, last_sequence) in self.token_repo.sequence_marks().await? {
            if let Err(e) = self
                .estimator
                .resume_numbering(&department_id, last_sequence)
            {
                warn!(department = %department_id, error = %e, "Skipping sequence mark");
            }
        }

        let tokens = self.token_repo.find_all().await?;
        let loaded = tokens.len();

        let outcome = self.estimator.restore(tokens);

        let mut unsaved_corrections = 0;
        for ack in outcome.acks {
            if let Err(e) = ack.wait().await {
                error!(error = %e, "Corrected estimates were not saved");
                unsaved_corrections += 1;
            }
        }

        info!(
            loaded,
            restored = outcome.restored,
            unsaved_corrections,
            "Queue recovery completed"
        );
        Ok(RecoveryReport {
            loaded,
            restored: outcome.restored,
            unsaved_corrections,
        })
    }
}
