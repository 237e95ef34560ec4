//! PostgreSQL Student Directory
//!
//! Reads students from the shared `students` table.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError, StudentId};
use domain_fees::{Student, StudentDirectory};

use crate::error::DatabaseError;
use crate::repositories::students::{StudentRepository, StudentRow};

/// PostgreSQL-backed implementation of the StudentDirectory trait
#[derive(Debug, Clone)]
pub struct PostgresStudentDirectory {
    repository: StudentRepository,
    pool: PgPool,
}

impl PostgresStudentDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: StudentRepository::new(pool.clone()),
            pool,
        }
    }

    /// Inserts or refreshes a student record
    pub async fn upsert_student(&self, student: &Student) -> Result<Student, PortError> {
        let row = self
            .repository
            .upsert(student.id.into(), &student.name, &student.status)
            .await?;
        Ok(row_to_student(row))
    }
}

impl DomainPort for PostgresStudentDirectory {}

#[async_trait]
impl HealthCheckable for PostgresStudentDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        super::check_pool(&self.pool, "postgres-student-directory").await
    }
}

#[async_trait]
impl StudentDirectory for PostgresStudentDirectory {
    #[instrument(skip(self), fields(student_id = %id))]
    async fn get_student(&self, id: StudentId) -> Result<Student, PortError> {
        debug!("Fetching student by ID");

        match self.repository.get_by_id(id.into()).await {
            Ok(row) => Ok(row_to_student(row)),
            Err(DatabaseError::NotFound(_)) => Err(PortError::not_found("Student", id)),
            Err(e) => Err(e.into()),
        }
    }
}

fn row_to_student(row: StudentRow) -> Student {
    Student::new(StudentId::from(row.id), row.name, row.status)
}
