// Maintenance Service
// Periodic retention pass over storage and the in-memory queues

use crate::application::queue::QueueEstimator;
use crate::application::shutdown::ShutdownToken;
use crate::error::Result;
use crate::port::{Maintenance, MaintenanceConfig, PurgeReport, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub purge: PurgeReport,
    pub evicted_from_memory: usize,
}

/// Maintenance scheduler
///
/// Deletes finished tokens and cancelled appointments past the retention
/// window, and evicts the same tokens from the estimator.
pub struct MaintenanceScheduler {
    maintenance: Arc<dyn Maintenance>,
    estimator: Arc<QueueEstimator>,
    time_provider: Arc<dyn TimeProvider>,
    config: MaintenanceConfig,
    interval: Duration,
}

impl MaintenanceScheduler {
    /// # Arguments
    /// * `maintenance` - Storage maintenance implementation
    /// * `estimator` - In-memory queues to evict from
    /// * `config` - Retention settings
    /// * `interval` - Time between passes
    pub fn new(
        maintenance: Arc<dyn Maintenance>,
        estimator: Arc<QueueEstimator>,
        time_provider: Arc<dyn TimeProvider>,
        config: MaintenanceConfig,
        interval: Duration,
    ) -> Self {
        Self {
            maintenance,
            estimator,
            time_provider,
            config,
            interval,
        }
    }

    /// Run maintenance loop until shutdown (spawn with tokio::spawn)
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.config.retention_days,
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = ?e, "Scheduled maintenance failed");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("Maintenance scheduler stopped");
    }

    /// One retention pass (also used for the manual admin trigger)
    pub async fn run_once(&self) -> Result<MaintenanceReport> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.config.retention_ms();

        let purge = self.maintenance.run_purge(&self.config, now).await?;
        let evicted_from_memory = self.estimator.evict_finished(cutoff);

        info!(
            tokens_deleted = purge.tokens_deleted,
            appointments_deleted = purge.appointments_deleted,
            evicted_from_memory,
            "Maintenance pass completed"
        );

        Ok(MaintenanceReport {
            purge,
            evicted_from_memory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::estimate::EstimatePolicy;
    use crate::domain::{Department, TokenStatus};
    use crate::port::mocks::{ManualClock, SequentialIdProvider};
    use crate::port::MaintenanceStats;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMaintenance {
        token_cutoffs: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Maintenance for RecordingMaintenance {
        async fn purge_finished_tokens(&self, before_ms: i64) -> Result<u64> {
            self.token_cutoffs.lock().unwrap().push(before_ms);
            Ok(2)
        }
        async fn purge_cancelled_appointments(&self, _before_ms: i64) -> Result<u64> {
            Ok(1)
        }
        async fn vacuum(&self) -> Result<()> {
            Ok(())
        }
        async fn stats(&self) -> Result<MaintenanceStats> {
            Ok(MaintenanceStats::default())
        }
    }

    #[tokio::test]
    async fn test_run_once_purges_and_evicts() {
        const DAY_MS: i64 = 24 * 60 * 60 * 1000;
        let clock = Arc::new(ManualClock::new(1_000));
        let estimator = Arc::new(
            QueueEstimator::new(
                vec![Department::new("GEN", "General Consultation", 15).unwrap()],
                EstimatePolicy::default(),
                Arc::new(SequentialIdProvider::new("tok")),
                clock.clone(),
            )
            .unwrap(),
        );
        let old = estimator.issue_token("GEN", false).unwrap().into_value();
        estimator
            .transition_status(&old.id, TokenStatus::Cancelled)
            .unwrap();
        let active = estimator.issue_token("GEN", false).unwrap().into_value();

        clock.set(1_000 + 8 * DAY_MS);
        let maintenance = Arc::new(RecordingMaintenance::default());
        let scheduler = MaintenanceScheduler::new(
            maintenance.clone(),
            estimator.clone(),
            clock,
            MaintenanceConfig::default(),
            Duration::from_secs(3600),
        );

        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.purge.tokens_deleted, 2);
        assert_eq!(report.purge.appointments_deleted, 1);
        assert_eq!(report.evicted_from_memory, 1);
        assert_eq!(*maintenance.token_cutoffs.lock().unwrap(), vec![1_000 + DAY_MS]);

        assert!(estimator.get_token(&old.id).is_err());
        assert!(estimator.get_token(&active.id).is_ok());
    }
}
