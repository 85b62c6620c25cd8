// SQLite AppointmentRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::NaiveDate;
use healthpoint_core::domain::{Appointment, AppointmentId, AppointmentStatus};
use healthpoint_core::error::Result;
use healthpoint_core::port::AppointmentRepository;
use sqlx::SqlitePool;

pub struct SqliteAppointmentRepository {
    pool: SqlitePool,
}

impl SqliteAppointmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppointmentRepository for SqliteAppointmentRepository {
    async fn insert(&self, appointment: &Appointment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, department_id, date, slot, patient_id, patient_name,
                contact, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&appointment.id)
        .bind(&appointment.department_id)
        .bind(appointment.date)
        .bind(&appointment.slot)
        .bind(&appointment.patient_id)
        .bind(&appointment.patient_name)
        .bind(&appointment.contact)
        .bind(appointment.status.to_string())
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, appointment: &Appointment) -> Result<()> {
        sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(appointment.status.to_string())
            .bind(appointment.updated_at)
            .bind(&appointment.id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>> {
        let row = sqlx::query_as::<_, AppointmentRow>("SELECT * FROM appointments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(AppointmentRow::into_appointment).transpose()
    }

    async fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(
            "SELECT * FROM appointments WHERE patient_id = ? ORDER BY created_at DESC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(AppointmentRow::into_appointment).collect()
    }

    async fn find_by_date(
        &self,
        date: NaiveDate,
        department_id: Option<&str>,
    ) -> Result<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(
            r#"
            SELECT * FROM appointments
            WHERE date = ? AND (? IS NULL OR department_id = ?)
            ORDER BY created_at ASC
            "#,
        )
        .bind(date)
        .bind(department_id)
        .bind(department_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(AppointmentRow::into_appointment).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    id: String,
    department_id: String,
    date: NaiveDate,
    slot: String,
    patient_id: String,
    patient_name: String,
    contact: Option<String>,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl AppointmentRow {
    fn into_appointment(self) -> Result<Appointment> {
        let status: AppointmentStatus = self.status.parse()?;
        Ok(Appointment {
            id: self.id,
            department_id: self.department_id,
            date: self.date,
            slot: self.slot,
            patient_id: self.patient_id,
            patient_name: self.patient_name,
            contact: self.contact,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup_repo() -> SqliteAppointmentRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteAppointmentRepository::new(pool)
    }

    fn appointment(id: &str, dept: &str, day: u32, created_at: i64) -> Appointment {
        Appointment {
            id: id.to_string(),
            department_id: dept.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            slot: "10:30 AM".to_string(),
            patient_id: "p-1".to_string(),
            patient_name: "Anita Rao".to_string(),
            contact: Some("555-0199".to_string()),
            status: AppointmentStatus::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_insert_update_find() {
        let repo = setup_repo().await;
        let mut appt = appointment("a-1", "GEN", 2, 1_000);
        repo.insert(&appt).await.unwrap();
        assert_eq!(repo.find_by_id(&appt.id).await.unwrap().unwrap(), appt);

        appt.approve(2_000).unwrap();
        repo.update(&appt).await.unwrap();
        let found = repo.find_by_id(&appt.id).await.unwrap().unwrap();
        assert_eq!(found.status, AppointmentStatus::Approved);
        assert_eq!(found.updated_at, 2_000);
    }

    #[tokio::test]
    async fn test_find_by_patient_and_date() {
        let repo = setup_repo().await;
        repo.insert(&appointment("a-1", "GEN", 2, 1_000)).await.unwrap();
        repo.insert(&appointment("a-2", "PED", 2, 2_000)).await.unwrap();
        repo.insert(&appointment("a-3", "GEN", 3, 3_000)).await.unwrap();

        let mine: Vec<String> = repo
            .find_by_patient("p-1")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(mine, vec!["a-3", "a-2", "a-1"]);

        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(repo.find_by_date(day, None).await.unwrap().len(), 2);
        let gen = repo.find_by_date(day, Some("GEN")).await.unwrap();
        assert_eq!(gen.len(), 1);
        assert_eq!(gen[0].id, "a-1");
    }
}
