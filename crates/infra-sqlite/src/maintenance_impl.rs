// SQLite Maintenance Implementation
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use healthpoint_core::domain::{AppointmentStatus, TokenStatus};
use healthpoint_core::error::Result;
use healthpoint_core::port::{Maintenance, MaintenanceStats};
use sqlx::SqlitePool;
use tracing::info;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn db_size_bytes(&self) -> Result<i64> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(page_count * page_size)
    }
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn purge_finished_tokens(&self, before_ms: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM tokens
            WHERE status IN (?, ?)
            AND updated_at < ?
            "#,
        )
        .bind(TokenStatus::Completed.to_string())
        .bind(TokenStatus::Cancelled.to_string())
        .bind(before_ms)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn purge_cancelled_appointments(&self, before_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM appointments WHERE status = ? AND updated_at < ?")
            .bind(AppointmentStatus::Cancelled.to_string())
            .bind(before_ms)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn vacuum(&self) -> Result<()> {
        let size_before = self.db_size_bytes().await?;

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let size_after = self.db_size_bytes().await?;
        info!(
            size_before_bytes = size_before,
            size_after_bytes = size_after,
            "VACUUM completed"
        );

        Ok(())
    }

    async fn stats(&self) -> Result<MaintenanceStats> {
        let db_size_bytes = self.db_size_bytes().await?;

        let token_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tokens")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let finished_token_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tokens WHERE status IN (?, ?)")
                .bind(TokenStatus::Completed.to_string())
                .bind(TokenStatus::Cancelled.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let appointment_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(MaintenanceStats {
            db_size_bytes,
            token_count,
            finished_token_count,
            appointment_count,
        })
    }
}
