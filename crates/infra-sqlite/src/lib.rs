// HealthPoint Infrastructure - SQLite Adapter
// Implements: DepartmentRepository, TokenRepository, AppointmentRepository, Maintenance

mod appointment_repository;
mod connection;
mod department_repository;
mod error;
mod maintenance_impl;
mod migration;
mod token_repository;

pub use appointment_repository::SqliteAppointmentRepository;
pub use connection::create_pool;
pub use department_repository::SqliteDepartmentRepository;
pub use maintenance_impl::SqliteMaintenance;
pub use migration::run_migrations;
pub use token_repository::SqliteTokenRepository;

// sqlx::Error cannot implement Into<AppError> here (orphan rules),
// so every query goes through error::map_sqlx_error
