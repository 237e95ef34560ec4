//! Student repository implementation
//!
//! The student table belongs to the wider academy system. The ledger reads
//! it, and seeds it in tests and local setups.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

/// Repository for student records
#[derive(Debug, Clone)]
pub struct StudentRepository {
    pool: PgPool,
}

impl StudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a student by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<StudentRow, DatabaseError> {
        sqlx::query_as::<_, StudentRow>(
            "SELECT id, name, status, created_at FROM students WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Student", id))
    }

    /// Inserts a student or refreshes its name and status
    pub async fn upsert(&self, id: Uuid, name: &str, status: &str) -> Result<StudentRow, DatabaseError> {
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            INSERT INTO students (id, name, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, status = EXCLUDED.status
            RETURNING id, name, status, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}

/// Database row for a student
#[derive(Debug, Clone, FromRow)]
pub struct StudentRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
