// SQLite TokenRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use healthpoint_core::domain::{DepartmentId, Token, TokenFields, TokenId, TokenStatus};
use healthpoint_core::error::{AppError, Result};
use healthpoint_core::port::TokenRepository;
use sqlx::SqlitePool;

pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn insert(&self, token: &Token) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Replayed batches re-insert the same id
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO tokens (
                id, department_id, sequence_number, number, priority, status,
                queue_position, estimated_wait_minutes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token.id)
        .bind(&token.department_id)
        .bind(token.sequence_number as i64)
        .bind(&token.number)
        .bind(token.priority)
        .bind(token.status.to_string())
        .bind(token.queue_position as i64)
        .bind(token.estimated_wait_minutes as i64)
        .bind(token.created_at)
        .bind(token.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO department_sequences (department_id, last_sequence)
            VALUES (?, ?)
            ON CONFLICT(department_id)
            DO UPDATE SET last_sequence = MAX(last_sequence, excluded.last_sequence)
            "#,
        )
        .bind(&token.department_id)
        .bind(token.sequence_number as i64)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_fields(&self, id: &TokenId, fields: &TokenFields) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET status = ?, queue_position = ?, estimated_wait_minutes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(fields.status.to_string())
        .bind(fields.queue_position as i64)
        .bind(fields.estimated_wait_minutes as i64)
        .bind(fields.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::PersistenceUnavailable(format!(
                "token {} is not stored",
                id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: &TokenId) -> Result<()> {
        sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &TokenId) -> Result<Option<Token>> {
        let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(TokenRow::into_token).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Token>> {
        let rows: Vec<TokenRow> =
            sqlx::query_as("SELECT * FROM tokens ORDER BY created_at ASC, sequence_number ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(TokenRow::into_token).collect()
    }

    async fn sequence_marks(&self) -> Result<Vec<(DepartmentId, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT department_id, last_sequence FROM department_sequences ORDER BY department_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(department_id, last)| {
                let last = u64::try_from(last).map_err(|_| {
                    AppError::Internal(format!("department {}: bad last_sequence", department_id))
                })?;
                Ok((department_id, last))
            })
            .collect()
    }

    async fn find_by_department(&self, department_id: &str) -> Result<Vec<Token>> {
        let rows: Vec<TokenRow> = sqlx::query_as(
            r#"
            SELECT * FROM tokens
            WHERE department_id = ?
            ORDER BY created_at ASC, sequence_number ASC
            "#,
        )
        .bind(department_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(TokenRow::into_token).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: String,
    department_id: String,
    sequence_number: i64,
    number: String,
    priority: bool,
    status: String,
    queue_position: i64,
    estimated_wait_minutes: i64,
    created_at: i64,
    updated_at: i64,
}

impl TokenRow {
    fn into_token(self) -> Result<Token> {
        let status: TokenStatus = self.status.parse()?;
        let corrupt = |field: &str| AppError::Internal(format!("token {}: bad {}", self.id, field));

        Ok(Token {
            sequence_number: u64::try_from(self.sequence_number)
                .map_err(|_| corrupt("sequence_number"))?,
            queue_position: u32::try_from(self.queue_position)
                .map_err(|_| corrupt("queue_position"))?,
            estimated_wait_minutes: u32::try_from(self.estimated_wait_minutes)
                .map_err(|_| corrupt("estimated_wait_minutes"))?,
            id: self.id,
            department_id: self.department_id,
            number: self.number,
            priority: self.priority,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
