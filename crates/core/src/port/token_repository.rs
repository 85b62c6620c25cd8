// Token Repository Port (Interface)

use crate::domain::{DepartmentId, Token, TokenFields, TokenId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Token persistence
///
/// Writes are issued by the persistence writer in mutation order, so
/// implementations may apply them without extra sequencing.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// PersistToken: store a newly issued token and raise the department's
    /// sequence mark to its number, in one write.
    /// Must be idempotent: re-inserting the same id overwrites it.
    async fn insert(&self, token: &Token) -> Result<()>;

    /// PersistTokenUpdate: overwrite the mutable fields of a token.
    /// A token that is not stored is an error, so a lost insert keeps
    /// reporting as unsaved.
    async fn update_fields(&self, id: &TokenId, fields: &TokenFields) -> Result<()>;

    /// Remove a token; removing a missing token is not an error
    async fn delete(&self, id: &TokenId) -> Result<()>;

    /// Find token by ID
    async fn find_by_id(&self, id: &TokenId) -> Result<Option<Token>>;

    /// Every stored token, oldest first (used to rebuild queues on startup)
    async fn find_all(&self) -> Result<Vec<Token>>;

    /// Highest sequence number ever issued per department. Survives
    /// deletion and retention purges of the tokens themselves.
    async fn sequence_marks(&self) -> Result<Vec<(DepartmentId, u64)>>;

    /// Tokens of one department, oldest first
    async fn find_by_department(&self, department_id: &str) -> Result<Vec<Token>>;
}
