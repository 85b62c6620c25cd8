// SQLite DepartmentRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use healthpoint_core::domain::Department;
use healthpoint_core::error::{AppError, Result};
use healthpoint_core::port::DepartmentRepository;
use sqlx::SqlitePool;

pub struct SqliteDepartmentRepository {
    pool: SqlitePool,
}

impl SqliteDepartmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepartmentRepository for SqliteDepartmentRepository {
    async fn load_departments(&self) -> Result<Vec<Department>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT id, name, baseline_service_minutes FROM departments ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(id, name, baseline)| {
                let baseline = u32::try_from(baseline).map_err(|_| {
                    AppError::Internal(format!("department {}: bad baseline {}", id, baseline))
                })?;
                Ok(Department::new(id, name, baseline)?)
            })
            .collect()
    }

    async fn upsert_departments(&self, departments: &[Department]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for dept in departments {
            sqlx::query(
                r#"
                INSERT INTO departments (id, name, baseline_service_minutes)
                VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    baseline_service_minutes = excluded.baseline_service_minutes
                "#,
            )
            .bind(&dept.id)
            .bind(&dept.name)
            .bind(dept.baseline_service_minutes as i64)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
