// sqlx::Error -> AppError
//
// Every storage failure surfaces as PersistenceUnavailable so the writer
// can retry and callers see one error kind regardless of cause.

use healthpoint_core::error::AppError;

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some("2067") | Some("1555") => AppError::PersistenceUnavailable(format!(
                    "Unique constraint violation: {}",
                    db_err.message()
                )),
                Some("275") => AppError::PersistenceUnavailable(format!(
                    "Check constraint violation: {}",
                    db_err.message()
                )),
                Some("5") => AppError::PersistenceUnavailable(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                Some("13") => {
                    AppError::PersistenceUnavailable(format!("Database full: {}", db_err.message()))
                }
                Some(code) => AppError::PersistenceUnavailable(format!(
                    "Database error [{}]: {}",
                    code,
                    db_err.message()
                )),
                None => {
                    AppError::PersistenceUnavailable(format!("Database error: {}", db_err.message()))
                }
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            AppError::PersistenceUnavailable(format!("Connection pool unavailable: {}", err))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            AppError::Internal(format!("Corrupt row: {}", err))
        }
        _ => AppError::PersistenceUnavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_retryable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            AppError::PersistenceUnavailable(_)
        ));
    }
}
