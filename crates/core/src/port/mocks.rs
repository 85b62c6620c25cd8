// ============================================================================
// In-memory port implementations for testing
// ============================================================================

use super::*;
use crate::domain::{
    Appointment, AppointmentId, Department, DepartmentId, Token, TokenFields, TokenId,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Deterministic IDs: `{prefix}-1`, `{prefix}-2`, ...
pub struct SequentialIdProvider {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(1),
        }
    }
}

impl IdProvider for SequentialIdProvider {
    fn generate_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// Clock that only moves when told to. Every read advances it by `step_ms`
/// so consecutive tokens get distinct creation times.
pub struct ManualClock {
    now: AtomicI64,
    step_ms: i64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self::with_step(start_ms, 0)
    }

    pub fn with_step(start_ms: i64, step_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
            step_ms,
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl TimeProvider for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(self.step_ms, Ordering::SeqCst)
    }
}

/// Token store with switchable failures
#[derive(Default)]
pub struct InMemoryTokenRepository {
    tokens: Mutex<HashMap<TokenId, Token>>,
    sequence_marks: Mutex<HashMap<DepartmentId, u64>>,
    failures_left: AtomicUsize,
    write_count: AtomicUsize,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with `PersistenceUnavailable`
    pub fn fail_next_writes(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: &str) -> Option<Token> {
        self.tokens.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_write(&self) -> Result<()> {
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AppError::PersistenceUnavailable(
                "injected write failure".to_string(),
            ));
        }
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn insert(&self, token: &Token) -> Result<()> {
        self.check_write()?;
        self.tokens
            .lock()
            .unwrap()
            .insert(token.id.clone(), token.clone());
        let mut marks = self.sequence_marks.lock().unwrap();
        let mark = marks.entry(token.department_id.clone()).or_insert(0);
        *mark = (*mark).max(token.sequence_number);
        Ok(())
    }

    async fn update_fields(&self, id: &TokenId, fields: &TokenFields) -> Result<()> {
        self.check_write()?;
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens.get_mut(id).ok_or_else(|| {
            AppError::PersistenceUnavailable(format!("token {} is not stored", id))
        })?;
        token.status = fields.status;
        token.queue_position = fields.queue_position;
        token.estimated_wait_minutes = fields.estimated_wait_minutes;
        token.updated_at = fields.updated_at;
        Ok(())
    }

    async fn delete(&self, id: &TokenId) -> Result<()> {
        self.check_write()?;
        self.tokens.lock().unwrap().remove(id);
        Ok(())
    }

    async fn find_by_id(&self, id: &TokenId) -> Result<Option<Token>> {
        Ok(self.get(id))
    }

    async fn find_all(&self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = self.tokens.lock().unwrap().values().cloned().collect();
        tokens.sort_by_key(|t| (t.created_at, t.sequence_number));
        Ok(tokens)
    }

    async fn sequence_marks(&self) -> Result<Vec<(DepartmentId, u64)>> {
        let mut marks: Vec<(DepartmentId, u64)> = self
            .sequence_marks
            .lock()
            .unwrap()
            .iter()
            .map(|(dept, seq)| (dept.clone(), *seq))
            .collect();
        marks.sort();
        Ok(marks)
    }

    async fn find_by_department(&self, department_id: &str) -> Result<Vec<Token>> {
        let mut tokens = self.find_all().await?;
        tokens.retain(|t| t.department_id == department_id);
        Ok(tokens)
    }
}

#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: Mutex<HashMap<AppointmentId, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert(&self, appointment: &Appointment) -> Result<()> {
        self.appointments
            .lock()
            .unwrap()
            .insert(appointment.id.clone(), appointment.clone());
        Ok(())
    }

    async fn update(&self, appointment: &Appointment) -> Result<()> {
        self.appointments
            .lock()
            .unwrap()
            .insert(appointment.id.clone(), appointment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>> {
        Ok(self.appointments.lock().unwrap().get(id).cloned())
    }

    async fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>> {
        let mut found: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_by_date(
        &self,
        date: NaiveDate,
        department_id: Option<&str>,
    ) -> Result<Vec<Appointment>> {
        let mut found: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.date == date)
            .filter(|a| department_id.map_or(true, |d| a.department_id == d))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }
}

#[derive(Default)]
pub struct InMemoryDepartmentRepository {
    departments: Mutex<Vec<Department>>,
}

impl InMemoryDepartmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DepartmentRepository for InMemoryDepartmentRepository {
    async fn load_departments(&self) -> Result<Vec<Department>> {
        let mut departments = self.departments.lock().unwrap().clone();
        departments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(departments)
    }

    async fn upsert_departments(&self, departments: &[Department]) -> Result<()> {
        let mut stored = self.departments.lock().unwrap();
        for dept in departments {
            stored.retain(|d| d.id != dept.id);
            stored.push(dept.clone());
        }
        Ok(())
    }
}
