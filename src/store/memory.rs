//! In-process store backed by concurrent maps.
//!
//! Used for local runs (`CLUBGATE_STORE=memory`) and as the fake store in
//! tests. Error messages mirror what Postgres reports for the same violations
//! so clients see the same `error` strings from either backend.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{PassStore, Page, ResourceStore};
use crate::models::attendance::{compute_streak, AttendanceRow};
use crate::models::pass::{AccessPass, NewAccessPass};
use crate::models::student::{NewStudent, Student};

#[derive(Default)]
pub struct MemoryStore {
    passes: DashMap<String, AccessPass>,
    students: DashMap<i64, Student>,
    usn_index: DashMap<String, i64>,
    attendance: DashMap<(i64, NaiveDate), bool>,
    next_student_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-specified pass, bypassing minting. Test and seed helper.
    pub fn put_pass(&self, pass: AccessPass) {
        self.passes.insert(pass.token.clone(), pass);
    }

    fn refresh_streak(&self, student_id: i64) {
        let mut marks: Vec<(NaiveDate, bool)> = self
            .attendance
            .iter()
            .filter(|e| e.key().0 == student_id)
            .map(|e| (e.key().1, *e.value()))
            .collect();
        marks.sort_by_key(|(date, _)| *date);

        let streak = compute_streak(marks.into_iter().map(|(_, present)| present));
        if let Some(mut student) = self.students.get_mut(&student_id) {
            student.current_streak = streak.current;
            student.highest_streak = streak.highest;
        }
    }
}

#[async_trait]
impl PassStore for MemoryStore {
    async fn find_pass(&self, token: &str) -> anyhow::Result<Option<AccessPass>> {
        Ok(self.passes.get(token).map(|p| p.value().clone()))
    }

    async fn insert_pass(&self, pass: &NewAccessPass) -> anyhow::Result<AccessPass> {
        match self.passes.entry(pass.token.clone()) {
            Entry::Occupied(_) => anyhow::bail!(
                "duplicate key value violates unique constraint \"access_passes_pkey\""
            ),
            Entry::Vacant(slot) => {
                let row = AccessPass {
                    token: pass.token.clone(),
                    label: pass.label.clone(),
                    scopes: pass.scopes.clone(),
                    expires_at: pass.expires_at,
                    is_active: true,
                    created_at: Utc::now(),
                };
                slot.insert(row.clone());
                Ok(row)
            }
        }
    }

    async fn list_passes(&self) -> anyhow::Result<Vec<AccessPass>> {
        let mut passes: Vec<AccessPass> = self.passes.iter().map(|p| p.value().clone()).collect();
        passes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(passes)
    }

    async fn deactivate_pass(&self, token: &str) -> anyhow::Result<bool> {
        match self.passes.get_mut(token) {
            Some(mut pass) => {
                pass.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list_students(&self, page: Page) -> anyhow::Result<Vec<Student>> {
        let mut students: Vec<Student> = self.students.iter().map(|s| s.value().clone()).collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let offset = page.offset.max(0) as usize;
        let iter = students.into_iter().skip(offset);
        Ok(match page.limit {
            Some(limit) => iter.take(limit.max(0) as usize).collect(),
            None => iter.collect(),
        })
    }

    async fn insert_student(&self, student: &NewStudent) -> anyhow::Result<Student> {
        match self.usn_index.entry(student.usn.clone()) {
            Entry::Occupied(_) => anyhow::bail!(
                "duplicate key value violates unique constraint \"students_50days_usn_key\""
            ),
            Entry::Vacant(slot) => {
                let id = self.next_student_id.fetch_add(1, Ordering::SeqCst) + 1;
                let row = Student {
                    id,
                    name: student.name.clone(),
                    usn: student.usn.clone(),
                    current_streak: 0,
                    highest_streak: 0,
                };
                self.students.insert(id, row.clone());
                slot.insert(id);
                Ok(row)
            }
        }
    }

    async fn attendance_for_date(&self, date: NaiveDate) -> anyhow::Result<Vec<AttendanceRow>> {
        let mut rows: Vec<AttendanceRow> = self
            .attendance
            .iter()
            .filter(|e| e.key().1 == date)
            .map(|e| AttendanceRow {
                student_id: e.key().0,
                present: *e.value(),
            })
            .collect();
        rows.sort_by_key(|r| r.student_id);
        Ok(rows)
    }

    async fn upsert_attendance(&self, date: NaiveDate, rows: &[AttendanceRow]) -> anyhow::Result<u64> {
        // All-or-nothing, like the single upsert statement on Postgres.
        if let Some(missing) = rows.iter().find(|r| !self.students.contains_key(&r.student_id)) {
            anyhow::bail!(
                "insert or update on table \"attendance_50days\" violates foreign key constraint \"attendance_50days_student_id_fkey\" (student_id={})",
                missing.student_id
            );
        }

        for row in rows {
            self.attendance.insert((row.student_id, date), row.present);
        }
        for row in rows {
            self.refresh_streak(row.student_id);
        }

        Ok(rows.len() as u64)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
