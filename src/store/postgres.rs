use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{PassStore, Page, ResourceStore};
use crate::models::attendance::{compute_streak, AttendanceRow};
use crate::models::pass::{AccessPass, NewAccessPass};
use crate::models::student::{NewStudent, Student};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

// -- Access Pass Operations --

#[async_trait]
impl PassStore for PgStore {
    async fn find_pass(&self, token: &str) -> anyhow::Result<Option<AccessPass>> {
        let row = sqlx::query_as::<_, AccessPass>(
            "SELECT token, label, scopes, expires_at, is_active, created_at FROM access_passes WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert_pass(&self, pass: &NewAccessPass) -> anyhow::Result<AccessPass> {
        let row = sqlx::query_as::<_, AccessPass>(
            r#"INSERT INTO access_passes (token, label, scopes, expires_at)
               VALUES ($1, $2, $3, $4)
               RETURNING token, label, scopes, expires_at, is_active, created_at"#,
        )
        .bind(&pass.token)
        .bind(&pass.label)
        .bind(&pass.scopes)
        .bind(pass.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_passes(&self) -> anyhow::Result<Vec<AccessPass>> {
        let rows = sqlx::query_as::<_, AccessPass>(
            "SELECT token, label, scopes, expires_at, is_active, created_at FROM access_passes ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn deactivate_pass(&self, token: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE access_passes SET is_active = false WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// -- Student / Attendance Operations --

#[async_trait]
impl ResourceStore for PgStore {
    async fn list_students(&self, page: Page) -> anyhow::Result<Vec<Student>> {
        // LIMIT NULL is "no limit" in Postgres.
        let rows = sqlx::query_as::<_, Student>(
            r#"SELECT id, name, usn, current_streak, highest_streak
               FROM students_50days
               ORDER BY name ASC, id ASC
               LIMIT $1 OFFSET $2"#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_student(&self, student: &NewStudent) -> anyhow::Result<Student> {
        let row = sqlx::query_as::<_, Student>(
            r#"INSERT INTO students_50days (name, usn) VALUES ($1, $2)
               RETURNING id, name, usn, current_streak, highest_streak"#,
        )
        .bind(&student.name)
        .bind(&student.usn)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn attendance_for_date(&self, date: NaiveDate) -> anyhow::Result<Vec<AttendanceRow>> {
        let rows = sqlx::query_as::<_, AttendanceRow>(
            "SELECT student_id, present FROM attendance_50days WHERE date = $1 ORDER BY student_id",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn upsert_attendance(&self, date: NaiveDate, rows: &[AttendanceRow]) -> anyhow::Result<u64> {
        let student_ids: Vec<i64> = rows.iter().map(|r| r.student_id).collect();
        let present: Vec<bool> = rows.iter().map(|r| r.present).collect();

        let mut tx = self.pool.begin().await?;

        let written = sqlx::query(
            r#"INSERT INTO attendance_50days (student_id, date, present)
               SELECT m.student_id, $3, m.present
               FROM UNNEST($1::BIGINT[], $2::BOOLEAN[]) AS m(student_id, present)
               ON CONFLICT (student_id, date) DO UPDATE
               SET present = EXCLUDED.present, updated_at = NOW()"#,
        )
        .bind(&student_ids)
        .bind(&present)
        .bind(date)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let history = sqlx::query_as::<_, (i64, bool)>(
            r#"SELECT student_id, present FROM attendance_50days
               WHERE student_id = ANY($1)
               ORDER BY student_id, date"#,
        )
        .bind(&student_ids)
        .fetch_all(&mut *tx)
        .await?;

        for chunk in history.chunk_by(|a, b| a.0 == b.0) {
            let student_id = chunk[0].0;
            let streak = compute_streak(chunk.iter().map(|(_, p)| *p));
            sqlx::query(
                "UPDATE students_50days SET current_streak = $2, highest_streak = $3 WHERE id = $1",
            )
            .bind(student_id)
            .bind(streak.current)
            .bind(streak.highest)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(%date, rows = written, "attendance upserted");
        Ok(written)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
