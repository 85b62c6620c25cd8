// Live status board figures per department

use serde::{Deserialize, Serialize};

use crate::application::queue::state::StatusCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadLevel {
    Low,
    Medium,
    High,
}

impl LoadLevel {
    pub fn from_waiting(waiting: usize) -> Self {
        if waiting > 8 {
            LoadLevel::High
        } else if waiting > 4 {
            LoadLevel::Medium
        } else {
            LoadLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueHealth {
    OnTrack,
    Delayed,
}

impl QueueHealth {
    pub fn from_waiting(waiting: usize) -> Self {
        if waiting > 10 {
            QueueHealth::Delayed
        } else {
            QueueHealth::OnTrack
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentStats {
    pub department_id: String,
    pub name: String,
    pub waiting: usize,
    pub priority_waiting: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    /// Token most recently called in
    pub now_serving: Option<String>,
    /// Token at queue position 1
    pub next_up: Option<String>,
    /// Estimated wait for a normal token issued now
    pub next_standard_wait_minutes: u32,
    pub load: LoadLevel,
    pub health: QueueHealth,
}

impl DepartmentStats {
    pub(crate) fn from_counts(
        department_id: &str,
        name: &str,
        counts: StatusCounts,
        now_serving: Option<String>,
        next_up: Option<String>,
        next_standard_wait_minutes: u32,
    ) -> Self {
        Self {
            department_id: department_id.to_string(),
            name: name.to_string(),
            waiting: counts.waiting,
            priority_waiting: counts.priority_waiting,
            in_progress: counts.in_progress,
            completed: counts.completed,
            cancelled: counts.cancelled,
            now_serving,
            next_up,
            next_standard_wait_minutes,
            load: LoadLevel::from_waiting(counts.waiting),
            health: QueueHealth::from_waiting(counts.waiting),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_thresholds() {
        assert_eq!(LoadLevel::from_waiting(0), LoadLevel::Low);
        assert_eq!(LoadLevel::from_waiting(4), LoadLevel::Low);
        assert_eq!(LoadLevel::from_waiting(5), LoadLevel::Medium);
        assert_eq!(LoadLevel::from_waiting(8), LoadLevel::Medium);
        assert_eq!(LoadLevel::from_waiting(9), LoadLevel::High);
    }

    #[test]
    fn test_health_threshold() {
        assert_eq!(QueueHealth::from_waiting(10), QueueHealth::OnTrack);
        assert_eq!(QueueHealth::from_waiting(11), QueueHealth::Delayed);
    }
}
