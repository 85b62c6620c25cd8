// Application Layer - Use Cases and Business Logic

pub mod appointment;
pub mod estimate;
pub mod maintenance;
pub mod persistence_writer;
pub mod queue;
pub mod recovery;
pub mod retry;
pub mod shutdown;

// Re-exports
pub use appointment::{AppointmentService, BookingRequest};
pub use estimate::{EstimatePolicy, DEFAULT_FIXED_OVERHEAD_MINUTES};
pub use maintenance::{MaintenanceReport, MaintenanceScheduler};
pub use persistence_writer::PersistenceWriter;
pub use queue::{DepartmentStats, PersistAck, PersistStatus, QueueEstimator, Receipt};
pub use recovery::RecoveryService;
pub use retry::RetryPolicy;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
