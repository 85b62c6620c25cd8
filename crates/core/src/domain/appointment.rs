// Appointment Domain Model
//
// Scheduled slots are decoupled from live queue tokens. No per-slot
// capacity is enforced: several patients may hold the same slot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::department::DepartmentId;
use crate::domain::error::{DomainError, Result};

/// Appointment ID (UUID v4)
pub type AppointmentId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Cancelled,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "PENDING"),
            AppointmentStatus::Approved => write!(f, "APPROVED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(AppointmentStatus::Pending),
            "APPROVED" => Ok(AppointmentStatus::Approved),
            "CANCELLED" | "CANCELED" => Ok(AppointmentStatus::Cancelled),
            _ => Err(DomainError::Validation(format!(
                "Invalid appointment status: '{}'",
                s
            ))),
        }
    }
}

/// Time-of-day slots offered for booking
pub fn default_slots() -> Vec<String> {
    [
        "09:00 AM", "09:30 AM", "10:00 AM", "10:30 AM", "11:00 AM", "11:30 AM", "02:00 PM",
        "02:30 PM", "03:00 PM", "03:30 PM", "04:00 PM", "04:30 PM",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub department_id: DepartmentId,
    pub date: NaiveDate,
    pub slot: String,
    pub patient_id: String,
    pub patient_name: String,
    pub contact: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: i64, // epoch ms
    pub updated_at: i64, // epoch ms
}

impl Appointment {
    pub fn approve(&mut self, now_millis: i64) -> Result<()> {
        match self.status {
            AppointmentStatus::Pending => {
                self.status = AppointmentStatus::Approved;
                self.updated_at = now_millis;
                Ok(())
            }
            AppointmentStatus::Approved => Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: AppointmentStatus::Approved.to_string(),
            }),
            AppointmentStatus::Cancelled => Err(self.terminal()),
        }
    }

    pub fn cancel(&mut self, now_millis: i64) -> Result<()> {
        if self.status == AppointmentStatus::Cancelled {
            return Err(self.terminal());
        }
        self.status = AppointmentStatus::Cancelled;
        self.updated_at = now_millis;
        Ok(())
    }

    fn terminal(&self) -> DomainError {
        DomainError::TerminalStateViolation {
            id: self.id.clone(),
            status: self.status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Appointment {
        Appointment {
            id: "a-1".to_string(),
            department_id: "GEN".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            slot: "09:00 AM".to_string(),
            patient_id: "p-1".to_string(),
            patient_name: "Priya Sharma".to_string(),
            contact: None,
            status: AppointmentStatus::Pending,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[test]
    fn test_approve_then_cancel() {
        let mut appt = pending();
        appt.approve(2000).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Approved);
        appt.cancel(3000).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Cancelled);
        assert_eq!(appt.updated_at, 3000);
    }

    #[test]
    fn test_double_approve_is_invalid() {
        let mut appt = pending();
        appt.approve(2000).unwrap();
        assert!(matches!(
            appt.approve(3000),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut appt = pending();
        appt.cancel(2000).unwrap();
        assert!(matches!(
            appt.approve(3000),
            Err(DomainError::TerminalStateViolation { .. })
        ));
        assert!(matches!(
            appt.cancel(3000),
            Err(DomainError::TerminalStateViolation { .. })
        ));
        assert_eq!(appt.updated_at, 2000);
    }

    #[test]
    fn test_default_slots() {
        let slots = default_slots();
        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0], "09:00 AM");
        assert_eq!(slots[11], "04:30 PM");
    }
}
