use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::student::Student;

/// One student's attendance for a given day, as returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRow {
    pub student_id: i64,
    pub present: bool,
}

/// Collapse a batch so each student appears once; the last mark wins.
/// A batch with the same student twice would otherwise hit the
/// `(student_id, date)` conflict key twice in one statement.
pub fn dedupe_marks(rows: &[AttendanceRow]) -> Vec<AttendanceRow> {
    let mut position: HashMap<i64, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<AttendanceRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match position.entry(row.student_id) {
            Entry::Occupied(slot) => out[*slot.get()].present = row.present,
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(*row);
            }
        }
    }
    out
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub current: i32,
    pub highest: i32,
}

/// Compute streaks from a student's marks in ascending date order.
///
/// `highest` is the longest run of consecutive present marks; `current` is the
/// run that ends at the most recent mark.
pub fn compute_streak<I>(marks_in_date_order: I) -> Streak
where
    I: IntoIterator<Item = bool>,
{
    let mut streak = Streak::default();
    for present in marks_in_date_order {
        if present {
            streak.current += 1;
            streak.highest = streak.highest.max(streak.current);
        } else {
            streak.current = 0;
        }
    }
    streak
}

/// Students split by whether they were marked present on `date`.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceSummary {
    pub date: NaiveDate,
    pub total: usize,
    pub present: Vec<Student>,
    pub absent: Vec<Student>,
}

impl AttendanceSummary {
    /// A student without a `present = true` row counts as absent.
    pub fn build(date: NaiveDate, students: Vec<Student>, rows: &[AttendanceRow]) -> Self {
        let total = students.len();
        let marked_present: HashSet<i64> = rows
            .iter()
            .filter(|r| r.present)
            .map(|r| r.student_id)
            .collect();
        let (present, absent): (Vec<Student>, Vec<Student>) = students
            .into_iter()
            .partition(|s| marked_present.contains(&s.id));
        Self {
            date,
            total,
            present,
            absent,
        }
    }
}
