use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

/// One write against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub marked_by: i64,
    /// `None` keeps whatever note the record already has
    pub notes: Option<String>,
}

/// Insert-or-update keyed by (student, date) as a single statement.
///
/// An existing row keeps its `created_at`; status, marker and `updated_at`
/// are overwritten. Concurrent writers to the same key serialize on the
/// unique constraint and the last one wins.
pub async fn upsert(
    conn: &mut SqliteConnection,
    entry: &LedgerEntry,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO attendance_records
            (student_id, date, status, marked_by, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, COALESCE(?, ''), ?, ?)
        ON CONFLICT (student_id, date) DO UPDATE SET
            status     = excluded.status,
            marked_by  = excluded.marked_by,
            notes      = COALESCE(?, attendance_records.notes),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(entry.student_id)
    .bind(entry.date)
    .bind(entry.status)
    .bind(entry.marked_by)
    .bind(&entry.notes)
    .bind(now)
    .bind(now)
    .bind(&entry.notes)
    .execute(conn)
    .await?;

    Ok(())
}

/// Every ledger row for students of `standard_id` on `date`.
pub async fn records_for_standard_on(
    pool: &SqlitePool,
    standard_id: i64,
    date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT r.id, r.student_id, r.date, r.status, r.marked_by, r.notes,
               r.created_at, r.updated_at
        FROM attendance_records r
        JOIN students s ON s.id = r.student_id
        WHERE s.standard_id = ? AND r.date = ?
        "#,
    )
    .bind(standard_id)
    .bind(date)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
pub async fn find_record(
    pool: &SqlitePool,
    student_id: i64,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, student_id, date, status, marked_by, notes, created_at, updated_at
        FROM attendance_records
        WHERE student_id = ? AND date = ?
        "#,
    )
    .bind(student_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}
