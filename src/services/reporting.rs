use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::attendance::AttendanceStatus;
use crate::model::standard::Standard;

pub const HISTORY_DEFAULT_PER_PAGE: u32 = 50;
pub const HISTORY_MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StandardSummary {
    pub standard: Standard,
    #[schema(example = "Class 5-A")]
    pub label: String,
    #[schema(example = 20)]
    pub total_students: i64,
    #[schema(example = 18)]
    pub present_today: i64,
    /// Counted inside `absent_today`
    #[schema(example = 0)]
    pub late_today: i64,
    #[schema(example = 2)]
    pub absent_today: i64,
    #[schema(example = 90.0)]
    pub percentage: f64,
}

/// `present / total` as a percentage rounded to one decimal; 0 for an empty
/// class. Clamped to [0, 100].
pub fn attendance_percentage(present: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let present = present.clamp(0, total);
    (present as f64 / total as f64 * 1000.0).round() / 10.0
}

impl StandardSummary {
    pub fn new(standard: Standard, total: i64, present: i64, late: i64) -> Self {
        let present = present.clamp(0, total.max(0));
        Self {
            label: standard.label(),
            standard,
            total_students: total,
            present_today: present,
            late_today: late,
            absent_today: total - present,
            percentage: attendance_percentage(present, total),
        }
    }
}

/// A ledger row joined with the student, standard and marker it refers to.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LedgerView {
    #[schema(example = 41)]
    pub record_id: i64,
    #[schema(example = "2024-01-03", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(example = "")]
    pub notes: String,
    #[schema(example = 12)]
    pub student_id: i64,
    #[schema(example = "12")]
    pub roll_number: String,
    #[schema(example = "Asha Verma")]
    pub student_name: String,
    #[schema(example = 3)]
    pub standard_id: i64,
    #[schema(example = "Class 5-A")]
    pub standard: String,
    /// Username of whoever marked the record last
    #[schema(example = "mrs.rao")]
    pub marked_by: String,
    #[schema(example = "2024-01-03T08:15:00Z", value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2024-01-03T08:15:00Z", value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

const LEDGER_VIEW_SELECT: &str = r#"
    SELECT r.id AS record_id, r.date, r.status, r.notes,
           s.id AS student_id, s.roll_number,
           s.first_name || ' ' || s.last_name AS student_name,
           st.id AS standard_id,
           'Class ' || st.name || '-' || st.section AS standard,
           u.username AS marked_by,
           r.created_at, r.updated_at
    FROM attendance_records r
    JOIN students s ON s.id = r.student_id
    JOIN standards st ON st.id = s.standard_id
    JOIN users u ON u.id = r.marked_by
"#;

/// Per-standard counts for `date`, in the standards' natural order.
///
/// Only active students count, on both sides of the ratio.
pub async fn daily_summary(
    pool: &SqlitePool,
    date: NaiveDate,
) -> Result<Vec<StandardSummary>, AppError> {
    let rows = sqlx::query_as::<_, (i64, String, String, i64, i64, i64)>(
        r#"
        SELECT st.id, st.name, st.section,
            (SELECT COUNT(*) FROM students s
             WHERE s.standard_id = st.id AND s.is_active = 1),
            (SELECT COUNT(*) FROM attendance_records r
             JOIN students s ON s.id = r.student_id
             WHERE s.standard_id = st.id AND s.is_active = 1
               AND r.date = ? AND r.status = 'present'),
            (SELECT COUNT(*) FROM attendance_records r
             JOIN students s ON s.id = r.student_id
             WHERE s.standard_id = st.id AND s.is_active = 1
               AND r.date = ? AND r.status = 'late')
        FROM standards st
        "#,
    )
    .bind(date)
    .bind(date)
    .fetch_all(pool)
    .await?;

    let mut summary: Vec<StandardSummary> = rows
        .into_iter()
        .map(|(id, name, section, total, present, late)| {
            StandardSummary::new(Standard { id, name, section }, total, present, late)
        })
        .collect();

    summary.sort_by(|a, b| a.standard.natural_cmp(&b.standard));
    Ok(summary)
}

/// Ledger rows dated within the last `window_days` days of `today`, most
/// recently modified first.
pub async fn recent_activity(
    pool: &SqlitePool,
    today: NaiveDate,
    window_days: u32,
    limit: u32,
) -> Result<Vec<LedgerView>, AppError> {
    let since = today - Duration::days(i64::from(window_days));
    let sql = format!(
        "{LEDGER_VIEW_SELECT} WHERE r.date >= ? ORDER BY r.updated_at DESC, r.id DESC LIMIT ?"
    );

    Ok(sqlx::query_as::<_, LedgerView>(&sql)
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?)
}

/// Typed filters for the history view; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub standard_id: Option<i64>,
    pub student_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryPage {
    pub data: Vec<LedgerView>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 50)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    I64(i64),
    Date(NaiveDate),
}

/// Ledger rows matching all given filters, newest date first, then by roll
/// number. Pages are bounded by `HISTORY_MAX_PER_PAGE`.
pub async fn filtered_history(
    pool: &SqlitePool,
    query: &HistoryQuery,
) -> Result<HistoryPage, AppError> {
    let per_page = query.per_page.clamp(1, HISTORY_MAX_PER_PAGE);
    let page = query.page.max(1);
    let offset = i64::from(page - 1) * i64::from(per_page);

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(standard_id) = query.standard_id {
        where_sql.push_str(" AND s.standard_id = ?");
        args.push(FilterValue::I64(standard_id));
    }
    if let Some(student_id) = query.student_id {
        where_sql.push_str(" AND r.student_id = ?");
        args.push(FilterValue::I64(student_id));
    }
    if let Some(start) = query.start_date {
        where_sql.push_str(" AND r.date >= ?");
        args.push(FilterValue::Date(start));
    }
    if let Some(end) = query.end_date {
        where_sql.push_str(" AND r.date <= ?");
        args.push(FilterValue::Date(end));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!(
        "SELECT COUNT(*) FROM attendance_records r JOIN students s ON s.id = r.student_id{where_sql}"
    );
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::I64(v) => count_q.bind(*v),
            FilterValue::Date(d) => count_q.bind(*d),
        };
    }
    let total = count_q.fetch_one(pool).await?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        "{LEDGER_VIEW_SELECT}{where_sql} ORDER BY r.date DESC, s.roll_number ASC, r.id ASC LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page, per_page, "Fetching attendance history");

    let mut data_q = sqlx::query_as::<_, LedgerView>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::I64(v) => data_q.bind(v),
            FilterValue::Date(d) => data_q.bind(d),
        };
    }
    let data = data_q
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(HistoryPage {
        data,
        page,
        per_page,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::ledger::tests::seed_user;
    use crate::services::roster::tests::{seed_standard, seed_student};
    use crate::services::roster::deactivate_student;
    use crate::services::workflow::{StatusMap, submit_attendance};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn history(standard_id: Option<i64>) -> HistoryQuery {
        HistoryQuery {
            standard_id,
            page: 1,
            per_page: HISTORY_DEFAULT_PER_PAGE,
            ..Default::default()
        }
    }

    #[test]
    fn percentage_is_bounded_and_safe_for_empty_classes() {
        assert_eq!(attendance_percentage(0, 0), 0.0);
        assert_eq!(attendance_percentage(5, 0), 0.0);
        assert_eq!(attendance_percentage(18, 20), 90.0);
        assert_eq!(attendance_percentage(1, 3), 33.3);
        assert_eq!(attendance_percentage(2, 3), 66.7);
        assert_eq!(attendance_percentage(30, 20), 100.0);
        assert_eq!(attendance_percentage(-1, 20), 0.0);
    }

    #[actix_web::test]
    async fn eighteen_of_twenty_is_ninety_percent() {
        let pool = test_pool().await;
        let std = seed_standard(&pool, "5", "A").await;
        let empty = seed_standard(&pool, "1", "A").await;
        let teacher = seed_user(&pool, "teacher").await;

        let mut marks = Vec::new();
        for roll in 1..=20 {
            let student = seed_student(&pool, std.id, &roll.to_string()).await;
            let status = if roll <= 18 {
                AttendanceStatus::Present
            } else {
                AttendanceStatus::Absent
            };
            marks.push((student.id, status));
        }
        let marks: StatusMap = marks.into_iter().collect();
        submit_attendance(&pool, std.id, day(3), &marks, teacher)
            .await
            .unwrap();

        let summary = daily_summary(&pool, day(3)).await.unwrap();
        assert_eq!(summary.len(), 2);

        assert_eq!(summary[0].standard.id, empty.id);
        assert_eq!(summary[0].total_students, 0);
        assert_eq!(summary[0].percentage, 0.0);

        let five = &summary[1];
        assert_eq!(five.label, "Class 5-A");
        assert_eq!(five.total_students, 20);
        assert_eq!(five.present_today, 18);
        assert_eq!(five.absent_today, 2);
        assert_eq!(five.percentage, 90.0);

        // other days are unaffected
        let next_day = daily_summary(&pool, day(4)).await.unwrap();
        assert_eq!(next_day[1].present_today, 0);
        assert_eq!(next_day[1].absent_today, 20);
    }

    #[actix_web::test]
    async fn late_counts_as_not_present_and_inactive_students_drop_out() {
        let pool = test_pool().await;
        let std = seed_standard(&pool, "2", "A").await;
        let teacher = seed_user(&pool, "teacher").await;
        let a = seed_student(&pool, std.id, "1").await;
        let b = seed_student(&pool, std.id, "2").await;
        let c = seed_student(&pool, std.id, "3").await;

        let marks: StatusMap = [
            (a.id, AttendanceStatus::Present),
            (b.id, AttendanceStatus::Late),
            (c.id, AttendanceStatus::Present),
        ]
        .into_iter()
        .collect();
        submit_attendance(&pool, std.id, day(3), &marks, teacher)
            .await
            .unwrap();
        deactivate_student(&pool, c.id).await.unwrap();

        let summary = daily_summary(&pool, day(3)).await.unwrap();
        let s = &summary[0];
        assert_eq!(s.total_students, 2);
        assert_eq!(s.present_today, 1);
        assert_eq!(s.late_today, 1);
        assert_eq!(s.absent_today, 1);
        assert_eq!(s.percentage, 50.0);
    }

    #[actix_web::test]
    async fn history_filters_by_standard_and_date_range() {
        let pool = test_pool().await;
        let three = seed_standard(&pool, "3", "A").await;
        let four = seed_standard(&pool, "4", "A").await;
        let teacher = seed_user(&pool, "teacher").await;
        let a1 = seed_student(&pool, three.id, "1").await;
        let a2 = seed_student(&pool, three.id, "2").await;
        let b1 = seed_student(&pool, four.id, "1").await;

        for d in [1, 4, 7, 9] {
            let marks: StatusMap = [
                (a1.id, AttendanceStatus::Present),
                (a2.id, AttendanceStatus::Absent),
            ]
            .into_iter()
            .collect();
            submit_attendance(&pool, three.id, day(d), &marks, teacher)
                .await
                .unwrap();
            let marks: StatusMap = [(b1.id, AttendanceStatus::Present)].into_iter().collect();
            submit_attendance(&pool, four.id, day(d), &marks, teacher)
                .await
                .unwrap();
        }

        let query = HistoryQuery {
            start_date: Some(day(1)),
            end_date: Some(day(7)),
            ..history(Some(three.id))
        };
        let page = filtered_history(&pool, &query).await.unwrap();

        assert_eq!(page.total, 6);
        assert!(page.data.iter().all(|r| r.standard_id == three.id));
        assert!(page.data.iter().all(|r| r.date >= day(1) && r.date <= day(7)));

        let order: Vec<(NaiveDate, &str)> = page
            .data
            .iter()
            .map(|r| (r.date, r.roll_number.as_str()))
            .collect();
        assert_eq!(
            order,
            [
                (day(7), "1"),
                (day(7), "2"),
                (day(4), "1"),
                (day(4), "2"),
                (day(1), "1"),
                (day(1), "2"),
            ]
        );
        assert_eq!(page.data[0].standard, "Class 3-A");
        assert_eq!(page.data[0].marked_by, "teacher");
    }

    #[actix_web::test]
    async fn history_filters_combine_and_paginate() {
        let pool = test_pool().await;
        let std = seed_standard(&pool, "3", "A").await;
        let teacher = seed_user(&pool, "teacher").await;
        let a = seed_student(&pool, std.id, "1").await;
        let b = seed_student(&pool, std.id, "2").await;

        for d in 1..=5 {
            let marks: StatusMap = [
                (a.id, AttendanceStatus::Present),
                (b.id, AttendanceStatus::Late),
            ]
            .into_iter()
            .collect();
            submit_attendance(&pool, std.id, day(d), &marks, teacher)
                .await
                .unwrap();
        }

        let only_b = HistoryQuery {
            student_id: Some(b.id),
            ..history(None)
        };
        let page = filtered_history(&pool, &only_b).await.unwrap();
        assert_eq!(page.total, 5);
        assert!(page.data.iter().all(|r| r.student_id == b.id));

        let second_page = HistoryQuery {
            page: 2,
            per_page: 4,
            ..history(None)
        };
        let page = filtered_history(&pool, &second_page).await.unwrap();
        assert_eq!(page.total, 10);
        assert_eq!(page.data.len(), 4);
        assert_eq!(page.data[0].date, day(3));

        let oversized = HistoryQuery {
            per_page: 10_000,
            ..history(None)
        };
        let page = filtered_history(&pool, &oversized).await.unwrap();
        assert_eq!(page.per_page, HISTORY_MAX_PER_PAGE);
    }

    #[actix_web::test]
    async fn recent_activity_is_windowed_newest_first_and_capped() {
        let pool = test_pool().await;
        let std = seed_standard(&pool, "3", "A").await;
        let teacher = seed_user(&pool, "teacher").await;
        let a = seed_student(&pool, std.id, "1").await;

        // marked in this order: day 20, then days 1..=12, newest edit last
        let mut days = vec![20];
        days.extend(1..=12);
        for d in days {
            let marks: StatusMap = [(a.id, AttendanceStatus::Present)].into_iter().collect();
            submit_attendance(&pool, std.id, day(d), &marks, teacher)
                .await
                .unwrap();
        }

        let recent = recent_activity(&pool, day(20), 7, 10).await.unwrap();
        assert!(recent.iter().all(|r| r.date >= day(13)));
        assert_eq!(recent.len(), 1);

        let wide = recent_activity(&pool, day(20), 30, 10).await.unwrap();
        assert_eq!(wide.len(), 10);
        assert_eq!(wide[0].date, day(12));
        assert_eq!(wide[0].student_name, "Student 1");
    }
}
