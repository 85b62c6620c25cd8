//! RPC Request/Response Types
//!
//! Parameters are passed by name. Mutations report whether the change
//! reached storage within the ack window.

use chrono::NaiveDate;
use healthpoint_core::application::{DepartmentStats, PersistStatus};
use healthpoint_core::domain::{Appointment, Department, Token};
use healthpoint_core::port::PurgeReport;
use serde::{Deserialize, Serialize};

/// queue.issue.v1
#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    pub department_id: String,
    #[serde(default)]
    pub priority: bool,
}

/// queue.transition.v1
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub token_id: String,
    pub status: String,
}

/// queue.delete.v1, queue.token.v1
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token_id: String,
}

/// queue.waiting.v1, queue.recompute.v1
#[derive(Debug, Deserialize)]
pub struct DepartmentRequest {
    pub department_id: String,
}

/// Durability of a mutation at the time the response was sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persistence {
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<PersistStatus> for Persistence {
    fn from(status: PersistStatus) -> Self {
        Self {
            persisted: status.is_persisted(),
            warning: status.warning(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenMutationResponse {
    pub token: Token,
    #[serde(flatten)]
    pub persistence: Persistence,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecomputeResponse {
    pub department_id: String,
    pub tokens: Vec<Token>,
    #[serde(flatten)]
    pub persistence: Persistence,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitingResponse {
    pub department_id: String,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub departments: Vec<DepartmentStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentsResponse {
    pub departments: Vec<Department>,
}

/// appointment.approve.v1, appointment.cancel.v1
#[derive(Debug, Deserialize)]
pub struct AppointmentRequest {
    pub appointment_id: String,
}

/// appointment.list.v1: by patient, or by day (optionally one department)
#[derive(Debug, Deserialize)]
pub struct ListAppointmentsRequest {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotsResponse {
    pub slots: Vec<String>,
}

/// admin.maintenance.v1
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceResponse {
    pub tokens_deleted: u64,
    pub appointments_deleted: u64,
    pub vacuumed: bool,
    pub evicted_from_memory: usize,
}

impl MaintenanceResponse {
    pub fn new(purge: PurgeReport, evicted_from_memory: usize) -> Self {
        Self {
            tokens_deleted: purge.tokens_deleted,
            appointments_deleted: purge.appointments_deleted,
            vacuumed: purge.vacuumed,
            evicted_from_memory,
        }
    }
}

/// queue.subscribe.v1; no department means every department
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub department_id: Option<String>,
}
