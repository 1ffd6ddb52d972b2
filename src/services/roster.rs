use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::{AppError, ValidationErrors, is_unique_violation};
use crate::forms::{ValidStandard, ValidStudent};
use crate::model::standard::Standard;
use crate::model::student::Student;

const STUDENT_COLUMNS: &str = r#"
    id, standard_id, roll_number, first_name, last_name, date_of_birth,
    parent_contact, address, admission_date, is_active
"#;

#[derive(Debug, Serialize, ToSchema)]
pub struct StandardOverview {
    #[serde(flatten)]
    pub standard: Standard,
    #[schema(example = "Class 5-A")]
    pub label: String,
    #[schema(example = 20)]
    pub active_students: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentListItem {
    #[serde(flatten)]
    pub student: Student,
    #[schema(example = "Asha Verma")]
    pub full_name: String,
    #[schema(example = "Class 5-A")]
    pub standard: String,
}

// =========================
// Standards
// =========================

pub async fn find_standard(
    conn: &mut SqliteConnection,
    standard_id: i64,
) -> Result<Option<Standard>, sqlx::Error> {
    sqlx::query_as::<_, Standard>("SELECT id, name, section FROM standards WHERE id = ?")
        .bind(standard_id)
        .fetch_optional(conn)
        .await
}

pub async fn get_standard(pool: &SqlitePool, standard_id: i64) -> Result<Standard, AppError> {
    let mut conn = pool.acquire().await?;
    find_standard(&mut conn, standard_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Standard {standard_id} not found")))
}

/// All standards in natural order (grade, then section).
pub async fn list_standards(pool: &SqlitePool) -> Result<Vec<Standard>, AppError> {
    let mut standards = sqlx::query_as::<_, Standard>("SELECT id, name, section FROM standards")
        .fetch_all(pool)
        .await?;

    standards.sort_by(Standard::natural_cmp);
    Ok(standards)
}

pub async fn list_standard_overviews(pool: &SqlitePool) -> Result<Vec<StandardOverview>, AppError> {
    let mut rows = sqlx::query_as::<_, (i64, String, String, i64)>(
        r#"
        SELECT st.id, st.name, st.section,
               (SELECT COUNT(*) FROM students s WHERE s.standard_id = st.id AND s.is_active = 1)
        FROM standards st
        "#,
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(id, name, section, active_students)| {
        let standard = Standard { id, name, section };
        StandardOverview {
            label: standard.label(),
            standard,
            active_students,
        }
    })
    .collect::<Vec<_>>();

    rows.sort_by(|a, b| a.standard.natural_cmp(&b.standard));
    Ok(rows)
}

pub async fn create_standard(pool: &SqlitePool, input: ValidStandard) -> Result<Standard, AppError> {
    let result = sqlx::query("INSERT INTO standards (name, section) VALUES (?, ?)")
        .bind(&input.name)
        .bind(&input.section)
        .execute(pool)
        .await;

    match result {
        Ok(done) => {
            let standard = Standard {
                id: done.last_insert_rowid(),
                name: input.name,
                section: input.section,
            };
            info!(standard_id = standard.id, label = %standard, "Standard created");
            Ok(standard)
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::validation(
            "name",
            format!("Class {}-{} already exists.", input.name, input.section),
        )),
        Err(e) => Err(e.into()),
    }
}

// =========================
// Students
// =========================

pub async fn find_student(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<Option<Student>, sqlx::Error> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
    sqlx::query_as::<_, Student>(&sql)
        .bind(student_id)
        .fetch_optional(conn)
        .await
}

pub async fn get_student(pool: &SqlitePool, student_id: i64) -> Result<Student, AppError> {
    let mut conn = pool.acquire().await?;
    find_student(&mut conn, student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {student_id} not found")))
}

/// Active students of one standard, ordered by roll number.
pub async fn active_students(
    pool: &SqlitePool,
    standard_id: i64,
) -> Result<Vec<Student>, AppError> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students \
         WHERE standard_id = ? AND is_active = 1 \
         ORDER BY roll_number"
    );

    Ok(sqlx::query_as::<_, Student>(&sql)
        .bind(standard_id)
        .fetch_all(pool)
        .await?)
}

pub async fn count_active_students(pool: &SqlitePool) -> Result<i64, AppError> {
    Ok(
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE is_active = 1")
            .fetch_one(pool)
            .await?,
    )
}

/// `%term%` for a literal, lowercased substring match under `ESCAPE '\'`.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Active students, optionally narrowed to one standard and a case-insensitive
/// search over first name, last name and roll number.
pub async fn search_students(
    pool: &SqlitePool,
    standard_id: Option<i64>,
    search: Option<&str>,
) -> Result<Vec<StudentListItem>, AppError> {
    let mut where_sql = String::from(" WHERE s.is_active = 1");
    if standard_id.is_some() {
        where_sql.push_str(" AND s.standard_id = ?");
    }
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);
    if pattern.is_some() {
        where_sql.push_str(
            r" AND (LOWER(s.first_name) LIKE ? ESCAPE '\' OR LOWER(s.last_name) LIKE ? ESCAPE '\' OR LOWER(s.roll_number) LIKE ? ESCAPE '\')",
        );
    }

    let sql = format!(
        r#"
        SELECT s.id, s.standard_id, s.roll_number, s.first_name, s.last_name, s.date_of_birth,
               s.parent_contact, s.address, s.admission_date, s.is_active
        FROM students s
        {where_sql}
        "#
    );
    debug!(sql = %sql, "Searching students");

    let mut query = sqlx::query_as::<_, Student>(&sql);
    if let Some(id) = standard_id {
        query = query.bind(id);
    }
    if let Some(p) = &pattern {
        query = query.bind(p).bind(p).bind(p);
    }
    let students = query.fetch_all(pool).await?;

    let standards = list_standards(pool).await?;
    let position = |id: i64| standards.iter().position(|s| s.id == id).unwrap_or(usize::MAX);

    let mut items: Vec<StudentListItem> = students
        .into_iter()
        .map(|student| {
            let standard = standards
                .iter()
                .find(|s| s.id == student.standard_id)
                .map(Standard::label)
                .unwrap_or_default();
            StudentListItem {
                full_name: student.full_name(),
                standard,
                student,
            }
        })
        .collect();

    items.sort_by(|a, b| {
        position(a.student.standard_id)
            .cmp(&position(b.student.standard_id))
            .then_with(|| a.student.roll_number.cmp(&b.student.roll_number))
    });

    Ok(items)
}

/// Checks the standard exists and no other student in it holds `roll_number`.
async fn check_roster_slot(
    pool: &SqlitePool,
    input: &ValidStudent,
    exclude_id: Option<i64>,
) -> Result<Standard, AppError> {
    let mut conn = pool.acquire().await?;

    let standard = find_standard(&mut conn, input.standard_id)
        .await?
        .ok_or_else(|| AppError::validation("standard", "Select a valid class"))?;

    let taken = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM students
            WHERE standard_id = ? AND roll_number = ? AND id != ?
        )
        "#,
    )
    .bind(input.standard_id)
    .bind(&input.roll_number)
    .bind(exclude_id.unwrap_or(0))
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        return Err(duplicate_roll(&input.roll_number, &standard));
    }

    Ok(standard)
}

fn duplicate_roll(roll_number: &str, standard: &Standard) -> AppError {
    AppError::Validation(ValidationErrors::single(
        "roll_number",
        format!("Roll number {roll_number} already exists in {standard}."),
    ))
}

pub async fn create_student(
    pool: &SqlitePool,
    input: ValidStudent,
    admission_date: NaiveDate,
) -> Result<Student, AppError> {
    let standard = check_roster_slot(pool, &input, None).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO students
            (standard_id, roll_number, first_name, last_name, date_of_birth,
             parent_contact, address, admission_date, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(input.standard_id)
    .bind(&input.roll_number)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.date_of_birth)
    .bind(&input.parent_contact)
    .bind(&input.address)
    .bind(admission_date)
    .execute(pool)
    .await;

    let student_id = match result {
        Ok(done) => done.last_insert_rowid(),
        // lost a race with a concurrent insert of the same roll number
        Err(e) if is_unique_violation(&e) => {
            return Err(duplicate_roll(&input.roll_number, &standard));
        }
        Err(e) => return Err(e.into()),
    };

    info!(student_id, standard = %standard, roll_number = %input.roll_number, "Student created");
    get_student(pool, student_id).await
}

pub async fn update_student(
    pool: &SqlitePool,
    student_id: i64,
    input: ValidStudent,
) -> Result<Student, AppError> {
    get_student(pool, student_id).await?;
    let standard = check_roster_slot(pool, &input, Some(student_id)).await?;

    let result = sqlx::query(
        r#"
        UPDATE students
        SET standard_id = ?, roll_number = ?, first_name = ?, last_name = ?,
            date_of_birth = ?, parent_contact = ?, address = ?
        WHERE id = ?
        "#,
    )
    .bind(input.standard_id)
    .bind(&input.roll_number)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.date_of_birth)
    .bind(&input.parent_contact)
    .bind(&input.address)
    .bind(student_id)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(duplicate_roll(&input.roll_number, &standard));
        }
        Err(e) => return Err(e.into()),
    }

    info!(student_id, "Student updated");
    get_student(pool, student_id).await
}

/// Soft delete: the student disappears from rosters, their ledger stays.
pub async fn deactivate_student(pool: &SqlitePool, student_id: i64) -> Result<Student, AppError> {
    let result = sqlx::query("UPDATE students SET is_active = 0 WHERE id = ?")
        .bind(student_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Student {student_id} not found")));
    }

    info!(student_id, "Student deactivated");
    get_student(pool, student_id).await
}
