// Appointment Repository Port (Interface)

use crate::domain::{Appointment, AppointmentId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<()>;

    /// Overwrite status and updated_at
    async fn update(&self, appointment: &Appointment) -> Result<()>;

    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>>;

    /// A patient's bookings, newest first
    async fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>>;

    /// Bookings for one day, optionally narrowed to a department
    async fn find_by_date(
        &self,
        date: NaiveDate,
        department_id: Option<&str>,
    ) -> Result<Vec<Appointment>>;
}
