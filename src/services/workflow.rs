//! Daily marking: build the sheet a teacher fills in, and write a submitted
//! sheet back to the ledger.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::db::WriteTx;
use crate::error::AppError;
use crate::forms::parse_date;
use crate::model::attendance::AttendanceStatus;
use crate::model::standard::Standard;
use crate::services::ledger::{self, LedgerEntry};
use crate::services::roster;

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkingRow {
    #[schema(example = 12)]
    pub student_id: i64,
    #[schema(example = "12")]
    pub roll_number: String,
    #[schema(example = "Asha Verma")]
    pub full_name: String,
    pub current_status: AttendanceStatus,
    #[schema(example = "")]
    pub notes: String,
    /// Whether a ledger row already exists for this day
    #[schema(example = false)]
    pub marked: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkingSheet {
    pub standard: Standard,
    #[schema(example = "Class 5-A")]
    pub label: String,
    #[schema(example = "2024-01-03", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub students: Vec<MarkingRow>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitOutcome {
    #[schema(example = "Attendance saved successfully for Class 5-A!")]
    pub message: String,
    #[schema(example = 20)]
    pub written: usize,
    #[schema(example = "Class 5-A")]
    pub standard: String,
    #[schema(example = "2024-01-03", value_type = String, format = "date")]
    pub date: NaiveDate,
}

/// A single student's mark as it appears in the submitted JSON.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMark {
    Status(String),
    Detailed {
        status: String,
        #[serde(default)]
        notes: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

/// Parsed submission, ordered by student id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMap(BTreeMap<i64, Mark>);

impl StatusMap {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &Mark)> {
        self.0.iter()
    }
}

impl FromIterator<(i64, AttendanceStatus)> for StatusMap {
    fn from_iter<I: IntoIterator<Item = (i64, AttendanceStatus)>>(iter: I) -> Self {
        StatusMap(
            iter.into_iter()
                .map(|(id, status)| (id, Mark { status, notes: None }))
                .collect(),
        )
    }
}

fn allowed_statuses() -> String {
    AttendanceStatus::iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses `{"<student id>": "present" | {"status": "late", "notes": "..."}}`.
pub fn parse_status_map(body: &[u8]) -> Result<StatusMap, AppError> {
    let raw: BTreeMap<String, RawMark> = serde_json::from_slice(body)
        .map_err(|e| AppError::MalformedInput(format!("Invalid attendance data: {e}")))?;

    if raw.is_empty() {
        return Err(AppError::MalformedInput("Attendance data is empty".into()));
    }

    let mut marks = BTreeMap::new();
    for (key, mark) in raw {
        let student_id: i64 = key
            .trim()
            .parse()
            .map_err(|_| AppError::MalformedInput(format!("Invalid student id {key:?}")))?;

        let (status, notes) = match mark {
            RawMark::Status(status) => (status, None),
            RawMark::Detailed { status, notes } => (status, notes),
        };
        let status = AttendanceStatus::from_str(status.trim()).map_err(|_| {
            AppError::MalformedInput(format!(
                "Invalid status {status:?} for student {student_id}; expected one of {}",
                allowed_statuses()
            ))
        })?;

        marks.insert(student_id, Mark { status, notes });
    }

    Ok(StatusMap(marks))
}

/// The marking date: today unless an earlier `YYYY-MM-DD` is given.
pub fn resolve_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(today);
    };

    let date = parse_date(raw)
        .ok_or_else(|| AppError::validation("date", "Enter a valid date (YYYY-MM-DD)"))?;
    if date > today {
        return Err(AppError::validation(
            "date",
            "Attendance cannot be marked for a future date",
        ));
    }
    Ok(date)
}

/// Active students of the standard with their status for `date`; students
/// without a ledger row show as absent.
pub async fn prepare_for_marking(
    pool: &SqlitePool,
    standard_id: i64,
    date: NaiveDate,
) -> Result<MarkingSheet, AppError> {
    let standard = roster::get_standard(pool, standard_id).await?;
    let students = roster::active_students(pool, standard_id).await?;

    let existing: HashMap<i64, _> = ledger::records_for_standard_on(pool, standard_id, date)
        .await?
        .into_iter()
        .map(|record| (record.student_id, record))
        .collect();

    let rows = students
        .into_iter()
        .map(|student| {
            let record = existing.get(&student.id);
            MarkingRow {
                student_id: student.id,
                full_name: student.full_name(),
                roll_number: student.roll_number,
                current_status: record.map(|r| r.status).unwrap_or_default(),
                notes: record.map(|r| r.notes.clone()).unwrap_or_default(),
                marked: record.is_some(),
            }
        })
        .collect();

    Ok(MarkingSheet {
        label: standard.label(),
        standard,
        date,
        students: rows,
    })
}

/// Upserts every mark in one transaction.
///
/// Each student must belong to the standard; the first one that does not
/// aborts the batch and nothing is written. Students missing from `marks`
/// are left as they were. The transaction takes the write lock before its
/// first read, so concurrent submits queue on the busy timeout and the last
/// one to commit wins.
pub async fn submit_attendance(
    pool: &SqlitePool,
    standard_id: i64,
    date: NaiveDate,
    marks: &StatusMap,
    marked_by: i64,
) -> Result<SubmitOutcome, AppError> {
    let mut tx = WriteTx::begin(pool).await?;

    let (standard, written) =
        match apply_marks(&mut tx, standard_id, date, marks, marked_by).await {
            Ok(applied) => applied,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

    tx.commit().await?;
    info!(standard = %standard, %date, written, marked_by, "Attendance saved");

    Ok(SubmitOutcome {
        message: format!("Attendance saved successfully for {standard}!"),
        written,
        standard: standard.label(),
        date,
    })
}

async fn apply_marks(
    conn: &mut SqliteConnection,
    standard_id: i64,
    date: NaiveDate,
    marks: &StatusMap,
    marked_by: i64,
) -> Result<(Standard, usize), AppError> {
    let now = Utc::now();

    let standard = roster::find_standard(conn, standard_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Standard {standard_id} not found")))?;

    let mut written = 0;
    for (&student_id, mark) in marks.iter() {
        let belongs = roster::find_student(conn, student_id)
            .await?
            .is_some_and(|s| s.standard_id == standard_id);

        if !belongs {
            warn!(student_id, standard_id, "Attendance batch aborted: unknown student");
            return Err(AppError::NotFound(format!(
                "Student {student_id} not found in {standard}"
            )));
        }

        let entry = LedgerEntry {
            student_id,
            date,
            status: mark.status,
            marked_by,
            notes: mark.notes.clone(),
        };
        ledger::upsert(conn, &entry, now).await?;
        written += 1;
    }

    Ok((standard, written))
}
