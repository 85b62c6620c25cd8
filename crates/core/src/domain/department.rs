// Department Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Department identifier (e.g. "GEN", "CARDIO")
pub type DepartmentId = String;

/// A hospital service line with its own queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    /// Average minutes needed to serve one patient
    pub baseline_service_minutes: u32,
}

impl Department {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        baseline_service_minutes: u32,
    ) -> Result<Self> {
        let id = id.into();
        let name = name.into();

        if id.trim().is_empty() {
            return Err(DomainError::Validation(
                "Department id cannot be empty".to_string(),
            ));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DomainError::Validation(format!(
                "Department id '{}' must be alphanumeric",
                id
            )));
        }
        if baseline_service_minutes == 0 {
            return Err(DomainError::Validation(format!(
                "Department {} needs a baseline service time above zero",
                id
            )));
        }

        Ok(Self {
            id,
            name,
            baseline_service_minutes,
        })
    }

    /// Prefix used in printed token numbers
    pub fn token_prefix(&self) -> String {
        self.id.to_uppercase()
    }
}

/// Departments of a general hospital front desk
pub fn default_departments() -> Vec<Department> {
    [
        ("GEN", "General Consultation", 15),
        ("PED", "Pediatrics", 45),
        ("ENT", "ENT Specialists", 20),
        ("ORTHO", "Orthopedics", 60),
        ("CARDIO", "Cardiology", 30),
        ("LAB", "Blood Lab & Tests", 10),
    ]
    .into_iter()
    .map(|(id, name, minutes)| Department {
        id: id.to_string(),
        name: name.to_string(),
        baseline_service_minutes: minutes,
    })
    .collect()
}
