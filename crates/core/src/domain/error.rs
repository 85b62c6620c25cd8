// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unknown department: {0}")]
    UnknownDepartment(String),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Unknown appointment: {0}")]
    UnknownAppointment(String),

    #[error("Unknown appointment slot: {0}")]
    UnknownSlot(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Completed and cancelled records never change again
    #[error("{id} is already {status} and cannot change")]
    TerminalStateViolation { id: String, status: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl DomainError {
    /// True for the "no such thing" family of errors
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::UnknownDepartment(_)
                | DomainError::UnknownToken(_)
                | DomainError::UnknownAppointment(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
