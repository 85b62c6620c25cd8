// Token Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::department::DepartmentId;
use crate::domain::error::{DomainError, Result};

/// Token ID (UUID v4)
pub type TokenId = String;

/// Token status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

impl TokenStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TokenStatus::Completed | TokenStatus::Cancelled)
    }

    /// Whether `self -> to` is an allowed edge of the token state machine
    pub fn can_transition_to(&self, to: TokenStatus) -> bool {
        matches!(
            (self, to),
            (TokenStatus::Waiting, TokenStatus::InProgress)
                | (TokenStatus::Waiting, TokenStatus::Cancelled)
                | (TokenStatus::InProgress, TokenStatus::Completed)
                | (TokenStatus::InProgress, TokenStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenStatus::Waiting => write!(f, "WAITING"),
            TokenStatus::InProgress => write!(f, "IN_PROGRESS"),
            TokenStatus::Completed => write!(f, "COMPLETED"),
            TokenStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for TokenStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "WAITING" => Ok(TokenStatus::Waiting),
            "IN_PROGRESS" | "INPROGRESS" | "CALLED" => Ok(TokenStatus::InProgress),
            "COMPLETED" | "DONE" => Ok(TokenStatus::Completed),
            "CANCELLED" | "CANCELED" => Ok(TokenStatus::Cancelled),
            _ => Err(DomainError::Validation(format!(
                "Invalid token status: '{}'. Must be one of: WAITING, IN_PROGRESS, COMPLETED, CANCELLED",
                s
            ))),
        }
    }
}

/// Render a sequence number as `{DEPT}-{NNN}`
pub fn format_token_number(prefix: &str, sequence_number: u64) -> String {
    format!("{}-{:03}", prefix, sequence_number)
}

/// A patient's live place in a department queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub department_id: DepartmentId,
    pub sequence_number: u64,
    /// Printed form of `sequence_number`, e.g. `GEN-007`
    pub number: String,
    pub priority: bool,
    pub status: TokenStatus,

    /// 1-based serving rank, 0 once the token has left the waiting set
    pub queue_position: u32,
    pub estimated_wait_minutes: u32,

    pub created_at: i64, // epoch ms
    pub updated_at: i64, // epoch ms
}

impl Token {
    /// Create a waiting token
    ///
    /// # Arguments
    ///
    /// * `id` - Unique token ID (injected, not generated)
    /// * `department_prefix` - Upper-case department id used in the printed number
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        department_id: impl Into<String>,
        department_prefix: &str,
        sequence_number: u64,
        priority: bool,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            department_id: department_id.into(),
            sequence_number,
            number: format_token_number(department_prefix, sequence_number),
            priority,
            status: TokenStatus::Waiting,
            queue_position: 0,
            estimated_wait_minutes: 0,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == TokenStatus::Waiting
    }

    /// Move to `to`, returning the previous status
    pub fn transition(&mut self, to: TokenStatus, now_millis: i64) -> Result<TokenStatus> {
        if self.status.is_terminal() {
            return Err(DomainError::TerminalStateViolation {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        let previous = self.status;
        self.status = to;
        self.updated_at = now_millis;

        if !self.is_waiting() {
            self.queue_position = 0;
            self.estimated_wait_minutes = 0;
        }

        Ok(previous)
    }

    /// Snapshot of the mutable fields
    pub fn fields(&self) -> TokenFields {
        TokenFields {
            status: self.status,
            queue_position: self.queue_position,
            estimated_wait_minutes: self.estimated_wait_minutes,
            updated_at: self.updated_at,
        }
    }
}

/// Mutable part of a token, as written by PersistTokenUpdate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFields {
    pub status: TokenStatus,
    pub queue_position: u32,
    pub estimated_wait_minutes: u32,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiting() -> Token {
        Token::new("t-1", "GEN", "GEN", 1, false, 1000)
    }

    #[test]
    fn test_number_is_zero_padded() {
        assert_eq!(format_token_number("GEN", 7), "GEN-007");
        assert_eq!(format_token_number("LAB", 1234), "LAB-1234");
        assert_eq!(waiting().number, "GEN-001");
    }

    #[test]
    fn test_valid_transitions() {
        let mut token = waiting();
        assert_eq!(
            token.transition(TokenStatus::InProgress, 2000).unwrap(),
            TokenStatus::Waiting
        );
        assert_eq!(token.updated_at, 2000);
        token.transition(TokenStatus::Completed, 3000).unwrap();
        assert_eq!(token.status, TokenStatus::Completed);
    }

    #[test]
    fn test_waiting_cannot_complete() {
        let mut token = waiting();
        let err = token.transition(TokenStatus::Completed, 2000).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(token.status, TokenStatus::Waiting);
        assert_eq!(token.updated_at, 1000);
    }

    #[test]
    fn test_terminal_is_locked() {
        let mut token = waiting();
        token.transition(TokenStatus::Cancelled, 2000).unwrap();
        let before = token.clone();

        for to in [
            TokenStatus::Waiting,
            TokenStatus::InProgress,
            TokenStatus::Completed,
            TokenStatus::Cancelled,
        ] {
            let err = token.transition(to, 9000).unwrap_err();
            assert!(matches!(err, DomainError::TerminalStateViolation { .. }));
        }
        assert_eq!(token, before);
    }

    #[test]
    fn test_leaving_waiting_clears_estimate() {
        let mut token = waiting();
        token.queue_position = 3;
        token.estimated_wait_minutes = 50;
        token.transition(TokenStatus::InProgress, 2000).unwrap();
        assert_eq!(token.queue_position, 0);
        assert_eq!(token.estimated_wait_minutes, 0);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("in_progress".parse::<TokenStatus>().unwrap(), TokenStatus::InProgress);
        assert_eq!("called".parse::<TokenStatus>().unwrap(), TokenStatus::InProgress);
        assert_eq!("CANCELLED".parse::<TokenStatus>().unwrap(), TokenStatus::Cancelled);
        assert!("paused".parse::<TokenStatus>().is_err());
    }
}
