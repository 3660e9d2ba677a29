pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::attendance::AttendanceRow;
use crate::models::pass::{AccessPass, NewAccessPass};
use crate::models::student::{NewStudent, Student};

/// Offset/limit window over an ordered listing. `limit: None` means "all".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: i64,
}

/// Access-pass records. Request handling only ever calls [`PassStore::find_pass`];
/// the rest is for out-of-band administration.
#[async_trait]
pub trait PassStore: Send + Sync {
    /// Look up a pass by exact token equality.
    async fn find_pass(&self, token: &str) -> anyhow::Result<Option<AccessPass>>;

    async fn insert_pass(&self, pass: &NewAccessPass) -> anyhow::Result<AccessPass>;

    async fn list_passes(&self) -> anyhow::Result<Vec<AccessPass>>;

    /// Flip the kill-switch. Returns false when no such pass exists.
    async fn deactivate_pass(&self, token: &str) -> anyhow::Result<bool>;
}

/// Students and their attendance.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Students ordered by name ascending.
    async fn list_students(&self, page: Page) -> anyhow::Result<Vec<Student>>;

    /// Insert a student; a duplicate USN is an error.
    async fn insert_student(&self, student: &NewStudent) -> anyhow::Result<Student>;

    async fn attendance_for_date(&self, date: NaiveDate) -> anyhow::Result<Vec<AttendanceRow>>;

    /// Upsert marks keyed by `(student_id, date)` and refresh the affected
    /// students' streaks. `rows` must not repeat a student. Returns rows written.
    async fn upsert_attendance(&self, date: NaiveDate, rows: &[AttendanceRow]) -> anyhow::Result<u64>;

    /// Cheap liveness check used by `/readyz`.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Everything the server needs from its backing store.
pub trait Store: PassStore + ResourceStore {}

impl<T: PassStore + ResourceStore> Store for T {}
