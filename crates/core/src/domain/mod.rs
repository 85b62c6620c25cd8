// Domain Layer - Pure business logic and entities

pub mod appointment;
pub mod department;
pub mod error;
pub mod event;
pub mod token;

// Re-exports
pub use appointment::{default_slots, Appointment, AppointmentId, AppointmentStatus};
pub use department::{default_departments, Department, DepartmentId};
pub use error::DomainError;
pub use event::QueueEvent;
pub use token::{format_token_number, Token, TokenFields, TokenId, TokenStatus};
