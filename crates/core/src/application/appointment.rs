// Appointment booking use cases
use crate::domain::{Appointment, AppointmentId, AppointmentStatus, Department, DomainError};
use crate::error::Result;
use crate::port::{AppointmentRepository, IdProvider, TimeProvider};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub department_id: String,
    pub date: NaiveDate,
    pub slot: String,
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub contact: Option<String>,
}

/// Appointment service
///
/// Slotted bookings live beside the walk-in queue and never touch it.
pub struct AppointmentService {
    repo: Arc<dyn AppointmentRepository>,
    departments: HashMap<String, Department>,
    slots: Vec<String>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl AppointmentService {
    pub fn new(
        repo: Arc<dyn AppointmentRepository>,
        departments: Vec<Department>,
        slots: Vec<String>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            repo,
            departments: departments
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
            slots,
            id_provider,
            time_provider,
        }
    }

    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    /// Book a slot; the appointment starts out `Pending`
    pub async fn book(&self, req: BookingRequest) -> Result<Appointment> {
        if !self.departments.contains_key(&req.department_id) {
            return Err(DomainError::UnknownDepartment(req.department_id).into());
        }
        if !self.slots.iter().any(|s| *s == req.slot) {
            return Err(DomainError::UnknownSlot(req.slot).into());
        }
        if req.patient_id.trim().is_empty() {
            return Err(DomainError::Validation("patient_id must not be empty".to_string()).into());
        }
        if req.patient_name.trim().is_empty() {
            return Err(
                DomainError::Validation("patient_name must not be empty".to_string()).into(),
            );
        }
        let today = self.time_provider.today();
        if req.date < today {
            return Err(DomainError::Validation(format!(
                "cannot book {} (today is {})",
                req.date, today
            ))
            .into());
        }

        let now = self.time_provider.now_millis();
        let appointment = Appointment {
            id: self.id_provider.generate_id(),
            department_id: req.department_id,
            date: req.date,
            slot: req.slot,
            patient_id: req.patient_id.trim().to_string(),
            patient_name: req.patient_name.trim().to_string(),
            contact: req.contact.filter(|c| !c.trim().is_empty()),
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.repo.insert(&appointment).await?;

        info!(
            appointment_id = %appointment.id,
            department_id = %appointment.department_id,
            date = %appointment.date,
            slot = %appointment.slot,
            "Appointment booked"
        );
        Ok(appointment)
    }

    pub async fn approve(&self, id: &AppointmentId) -> Result<Appointment> {
        let mut appointment = self.get(id).await?;
        appointment.approve(self.time_provider.now_millis())?;
        self.repo.update(&appointment).await?;

        info!(appointment_id = %id, "Appointment approved");
        Ok(appointment)
    }

    pub async fn cancel(&self, id: &AppointmentId) -> Result<Appointment> {
        let mut appointment = self.get(id).await?;
        appointment.cancel(self.time_provider.now_millis())?;
        self.repo.update(&appointment).await?;

        info!(appointment_id = %id, "Appointment cancelled");
        Ok(appointment)
    }

    pub async fn get(&self, id: &AppointmentId) -> Result<Appointment> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UnknownAppointment(id.clone()).into())
    }

    /// A patient's bookings, newest first
    pub async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<Appointment>> {
        self.repo.find_by_patient(patient_id).await
    }

    /// One day's bookings in slot order (bookings for slots no longer
    /// configured go last)
    pub async fn list_for_day(
        &self,
        department_id: Option<&str>,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>> {
        if let Some(dept) = department_id {
            if !self.departments.contains_key(dept) {
                return Err(DomainError::UnknownDepartment(dept.to_string()).into());
            }
        }

        let mut appointments = self.repo.find_by_date(date, department_id).await?;
        appointments.sort_by_key(|a| {
            let slot_index = self
                .slots
                .iter()
                .position(|s| *s == a.slot)
                .unwrap_or(usize::MAX);
            (slot_index, a.created_at)
        });
        Ok(appointments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{default_departments, default_slots};
    use crate::error::AppError;
    use crate::port::mocks::{InMemoryAppointmentRepository, ManualClock, SequentialIdProvider};

    // 2026-03-02T00:00:00Z
    const MARCH_2_MS: i64 = 1_772_409_600_000;

    fn service() -> AppointmentService {
        AppointmentService::new(
            Arc::new(InMemoryAppointmentRepository::new()),
            default_departments(),
            default_slots(),
            Arc::new(SequentialIdProvider::new("appt")),
            Arc::new(ManualClock::with_step(MARCH_2_MS, 1)),
        )
    }

    fn request(slot: &str, date: NaiveDate) -> BookingRequest {
        BookingRequest {
            department_id: "GEN".to_string(),
            date,
            slot: slot.to_string(),
            patient_id: "p-17".to_string(),
            patient_name: "Ravi Kumar".to_string(),
            contact: Some("555-0101".to_string()),
        }
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn domain_err(err: AppError) -> DomainError {
        match err {
            AppError::Domain(e) => e,
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_book_creates_pending() {
        let svc = service();
        let appt = svc.book(request("10:00 AM", march(2))).await.unwrap();

        assert_eq!(appt.id, "appt-1");
        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(svc.get(&appt.id).await.unwrap(), appt);
    }

    #[tokio::test]
    async fn test_book_rejects_bad_input() {
        let svc = service();

        let mut req = request("10:00 AM", march(3));
        req.department_id = "XRAY".to_string();
        assert_eq!(
            domain_err(svc.book(req).await.unwrap_err()),
            DomainError::UnknownDepartment("XRAY".to_string())
        );

        assert_eq!(
            domain_err(svc.book(request("01:00 PM", march(3))).await.unwrap_err()),
            DomainError::UnknownSlot("01:00 PM".to_string())
        );

        let mut req = request("10:00 AM", march(3));
        req.patient_name = "  ".to_string();
        assert!(matches!(
            domain_err(svc.book(req).await.unwrap_err()),
            DomainError::Validation(_)
        ));

        assert!(matches!(
            domain_err(svc.book(request("10:00 AM", march(1))).await.unwrap_err()),
            DomainError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_approve_and_cancel_lifecycle() {
        let svc = service();
        let appt = svc.book(request("09:30 AM", march(4))).await.unwrap();

        let approved = svc.approve(&appt.id).await.unwrap();
        assert_eq!(approved.status, AppointmentStatus::Approved);
        assert!(matches!(
            domain_err(svc.approve(&appt.id).await.unwrap_err()),
            DomainError::InvalidTransition { .. }
        ));

        let cancelled = svc.cancel(&appt.id).await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert!(matches!(
            domain_err(svc.cancel(&appt.id).await.unwrap_err()),
            DomainError::TerminalStateViolation { .. }
        ));
        assert_eq!(
            svc.get(&appt.id).await.unwrap().status,
            AppointmentStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_unknown_appointment() {
        let svc = service();
        let err = svc.approve(&"missing".to_string()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_for_day_in_slot_order() {
        let svc = service();
        svc.book(request("04:30 PM", march(5))).await.unwrap();
        svc.book(request("09:00 AM", march(5))).await.unwrap();
        svc.book(request("11:00 AM", march(5))).await.unwrap();
        svc.book(request("10:00 AM", march(6))).await.unwrap();

        let day = svc.list_for_day(Some("GEN"), march(5)).await.unwrap();
        let slots: Vec<&str> = day.iter().map(|a| a.slot.as_str()).collect();
        assert_eq!(slots, vec!["09:00 AM", "11:00 AM", "04:30 PM"]);

        assert!(svc.list_for_day(Some("PED"), march(5)).await.unwrap().is_empty());
        assert_eq!(svc.list_for_patient("p-17").await.unwrap().len(), 4);
    }
}
