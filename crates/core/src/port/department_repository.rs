// Department Repository Port (Interface)

use crate::domain::Department;
use crate::error::Result;
use async_trait::async_trait;

/// Persistence of the static department catalogue
#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    /// LoadDepartments: every configured department, ordered by id
    async fn load_departments(&self) -> Result<Vec<Department>>;

    /// Insert or replace departments (seeded from configuration at startup)
    async fn upsert_departments(&self, departments: &[Department]) -> Result<()>;
}
