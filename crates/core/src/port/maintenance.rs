// Storage Maintenance port (retention window for finished records)
use crate::error::Result;
use async_trait::async_trait;

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct MaintenanceStats {
    pub db_size_bytes: i64,
    pub token_count: i64,
    pub finished_token_count: i64,
    pub appointment_count: i64,
}

/// Maintenance configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Days a completed or cancelled token is kept after its last change
    pub retention_days: i64,

    /// Maximum DB size before forcing VACUUM (bytes)
    pub max_db_size_bytes: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            max_db_size_bytes: 256 * 1024 * 1024,
        }
    }
}

impl MaintenanceConfig {
    pub fn retention_ms(&self) -> i64 {
        self.retention_days * 24 * 60 * 60 * 1000
    }
}

/// Outcome of one purge pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub tokens_deleted: u64,
    pub appointments_deleted: u64,
    pub vacuumed: bool,
}

/// Storage maintenance operations
#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Delete completed/cancelled tokens last changed before `before_ms`
    async fn purge_finished_tokens(&self, before_ms: i64) -> Result<u64>;

    /// Delete cancelled appointments last changed before `before_ms`
    async fn purge_cancelled_appointments(&self, before_ms: i64) -> Result<u64>;

    /// Reclaim free pages
    async fn vacuum(&self) -> Result<()>;

    async fn stats(&self) -> Result<MaintenanceStats>;

    /// Purge everything past the retention window, then VACUUM if the store is large
    async fn run_purge(&self, config: &MaintenanceConfig, now_ms: i64) -> Result<PurgeReport> {
        let cutoff = now_ms - config.retention_ms();

        let tokens_deleted = self.purge_finished_tokens(cutoff).await?;
        let appointments_deleted = self.purge_cancelled_appointments(cutoff).await?;

        let stats = self.stats().await?;
        let vacuumed = stats.db_size_bytes > config.max_db_size_bytes;
        if vacuumed {
            self.vacuum().await?;
        }

        tracing::info!(
            tokens_deleted,
            appointments_deleted,
            vacuumed,
            cutoff,
            "Purge completed"
        );

        Ok(PurgeReport {
            tokens_deleted,
            appointments_deleted,
            vacuumed,
        })
    }
}
