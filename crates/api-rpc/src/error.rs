//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use healthpoint_core::domain::DomainError;
use healthpoint_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const PERSISTENCE_ERROR: i32 = 5001;
}

/// Convert an application or domain error to a JSON-RPC ErrorObject
pub fn to_rpc_error(err: impl Into<AppError>) -> ErrorObjectOwned {
    let err = err.into();
    let code = match &err {
        AppError::Domain(e) => match e {
            DomainError::UnknownDepartment(_)
            | DomainError::UnknownToken(_)
            | DomainError::UnknownAppointment(_) => code::NOT_FOUND,
            DomainError::InvalidTransition { .. } | DomainError::TerminalStateViolation { .. } => {
                code::CONFLICT
            }
            DomainError::UnknownSlot(_) | DomainError::Validation(_) => code::VALIDATION_ERROR,
        },
        AppError::Validation(_) | AppError::Serialization(_) => code::VALIDATION_ERROR,
        AppError::PersistenceUnavailable(_) => code::PERSISTENCE_ERROR,
        AppError::Io(_) | AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };

    let message = match &err {
        AppError::Domain(e) => e.to_string(),
        other => other.to_string(),
    };
    ErrorObjectOwned::owned(code, message, None::<()>)
}
