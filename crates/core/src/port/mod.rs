// Port Layer - Interfaces for external dependencies

pub mod appointment_repository;
pub mod department_repository;
pub mod id_provider; // For deterministic testing
pub mod maintenance;
#[cfg(any(test, feature = "test-util"))]
pub mod mocks;
pub mod time_provider;
pub mod token_repository;

// Re-exports
pub use appointment_repository::AppointmentRepository;
pub use department_repository::DepartmentRepository;
pub use id_provider::IdProvider;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats, PurgeReport};
pub use time_provider::TimeProvider;
pub use token_repository::TokenRepository;
