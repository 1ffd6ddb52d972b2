use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::password::hash_password;
use crate::db::WriteTx;
use crate::error::{AppError, ValidationErrors, is_unique_violation};
use crate::forms::ValidTeacher;
use crate::model::role::Role;
use crate::model::standard::Standard;
use crate::model::teacher_profile::TeacherProfile;
use crate::model::user::User;

#[derive(Debug, Serialize, ToSchema)]
pub struct Identity {
    #[schema(example = 4)]
    pub user_id: i64,
    #[schema(example = "mrs.rao")]
    pub username: String,
    #[schema(example = "Lakshmi Rao")]
    pub full_name: String,
    #[schema(example = "teacher")]
    pub role: String,
    pub teacher_profile: Option<TeacherProfile>,
    pub assigned_standards: Vec<Standard>,
}

fn hashed(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        AppError::Internal
    })
}

async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
    role: Role,
) -> Result<i64, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password, first_name, last_name, role_id, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .bind(role.id())
    .bind(Utc::now())
    .execute(conn)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::validation("username", "Username already taken"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Creates the teacher's login and profile, all or nothing.
///
/// Runs under the write lock from the start, so the employee id check and
/// the inserts cannot race another creation.
pub async fn create_teacher(pool: &SqlitePool, input: ValidTeacher) -> Result<Identity, AppError> {
    let password_hash = hashed(&input.password)?;
    let mut tx = WriteTx::begin(pool).await?;

    let user_id = match insert_teacher(&mut tx, &input, &password_hash).await {
        Ok(user_id) => user_id,
        Err(e) => {
            tx.rollback().await?;
            return Err(e);
        }
    };

    tx.commit().await?;
    info!(user_id, employee_id = %input.employee_id, "Teacher created");

    identity(pool, user_id).await
}

async fn insert_teacher(
    conn: &mut SqliteConnection,
    input: &ValidTeacher,
    password_hash: &str,
) -> Result<i64, AppError> {
    let mut errors = ValidationErrors::new();
    let employee_taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM teacher_profiles WHERE employee_id = ?)",
    )
    .bind(&input.employee_id)
    .fetch_one(&mut *conn)
    .await?;
    if employee_taken {
        errors.push(
            "employee_id",
            format!("Employee id {} already exists", input.employee_id),
        );
    }
    for standard_id in &input.assigned_standards {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM standards WHERE id = ?)")
                .bind(standard_id)
                .fetch_one(&mut *conn)
                .await?;
        if !exists {
            errors.push(
                "assigned_standards",
                format!("Standard {standard_id} does not exist"),
            );
        }
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let user_id = insert_user(
        conn,
        &input.username,
        password_hash,
        &input.first_name,
        &input.last_name,
        Role::Teacher,
    )
    .await?;

    let profile_id = sqlx::query(
        "INSERT INTO teacher_profiles (user_id, employee_id, phone) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(&input.employee_id)
    .bind(&input.phone)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    for standard_id in &input.assigned_standards {
        sqlx::query(
            "INSERT INTO teacher_standards (teacher_profile_id, standard_id) VALUES (?, ?)",
        )
        .bind(profile_id)
        .bind(standard_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(user_id)
}

pub async fn identity(pool: &SqlitePool, user_id: i64) -> Result<Identity, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, first_name, last_name, role_id, is_active, last_login_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    let teacher_profile = sqlx::query_as::<_, TeacherProfile>(
        "SELECT id, user_id, employee_id, phone FROM teacher_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let mut assigned_standards = match &teacher_profile {
        Some(profile) => {
            sqlx::query_as::<_, Standard>(
                r#"
                SELECT st.id, st.name, st.section
                FROM standards st
                JOIN teacher_standards ts ON ts.standard_id = st.id
                WHERE ts.teacher_profile_id = ?
                "#,
            )
            .bind(profile.id)
            .fetch_all(pool)
            .await?
        }
        None => Vec::new(),
    };
    assigned_standards.sort_by(Standard::natural_cmp);

    Ok(Identity {
        user_id: user.id,
        full_name: user.full_name(),
        role: Role::from_id(user.role_id)
            .map(|r| r.as_str().to_string())
            .unwrap_or_default(),
        username: user.username,
        teacher_profile,
        assigned_standards,
    })
}

/// Creates the configured administrator if no user has that name yet.
/// Returns whether a user was created.
pub async fn ensure_admin(pool: &SqlitePool, username: &str, password: &str) -> anyhow::Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(username)
        .fetch_one(pool)
        .await
        .context("Failed to look up admin user")?;
    if exists {
        return Ok(false);
    }

    let password_hash =
        hashed(password).map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;
    let mut conn = pool.acquire().await?;
    insert_user(&mut conn, username, &password_hash, "", "", Role::Admin)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create admin user: {e}"))?;

    info!(username, "Admin user created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{file_pool, remove_file_pool, test_pool};
    use crate::services::roster::tests::seed_standard;

    fn teacher(username: &str, employee_id: &str, standards: Vec<i64>) -> ValidTeacher {
        ValidTeacher {
            username: username.into(),
            password: "long-enough".into(),
            first_name: "Lakshmi".into(),
            last_name: "Rao".into(),
            employee_id: employee_id.into(),
            phone: String::new(),
            assigned_standards: standards,
        }
    }

    #[actix_web::test]
    async fn teacher_profile_lists_assigned_standards_in_order() {
        let pool = test_pool().await;
        let ten = seed_standard(&pool, "10", "A").await;
        let two = seed_standard(&pool, "2", "A").await;

        let created = create_teacher(&pool, teacher("rao", "T-1", vec![ten.id, two.id]))
            .await
            .unwrap();

        assert_eq!(created.role, "teacher");
        assert_eq!(created.full_name, "Lakshmi Rao");
        assert_eq!(created.teacher_profile.unwrap().employee_id, "T-1");
        let labels: Vec<String> = created
            .assigned_standards
            .iter()
            .map(Standard::label)
            .collect();
        assert_eq!(labels, ["Class 2-A", "Class 10-A"]);
    }

    #[actix_web::test]
    async fn duplicate_teacher_fields_are_validation_errors() {
        let pool = test_pool().await;
        create_teacher(&pool, teacher("rao", "T-1", vec![])).await.unwrap();

        let same_employee = create_teacher(&pool, teacher("other", "T-1", vec![])).await;
        assert!(matches!(same_employee, Err(AppError::Validation(ref e)) if e.has("employee_id")));

        let same_username = create_teacher(&pool, teacher("rao", "T-2", vec![])).await;
        assert!(matches!(same_username, Err(AppError::Validation(ref e)) if e.has("username")));

        let bad_standard = create_teacher(&pool, teacher("new", "T-3", vec![77])).await;
        assert!(
            matches!(bad_standard, Err(AppError::Validation(ref e)) if e.has("assigned_standards"))
        );

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);
    }

    #[actix_web::test]
    async fn admin_bootstrap_is_idempotent() {
        let pool = test_pool().await;
        assert!(ensure_admin(&pool, "admin", "admin-password").await.unwrap());
        assert!(!ensure_admin(&pool, "admin", "admin-password").await.unwrap());

        let role: u8 = sqlx::query_scalar("SELECT role_id FROM users WHERE username = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(role, Role::Admin.id());
    }

    #[actix_web::test]
    async fn concurrent_creations_with_one_employee_id_admit_one() {
        let (pool, path) = file_pool().await;

        let inputs: Vec<ValidTeacher> = (1..=4)
            .map(|n| teacher(&format!("teacher{n}"), "T-9", vec![]))
            .collect();
        let results = futures::future::join_all(
            inputs.into_iter().map(|input| create_teacher(&pool, input)),
        )
        .await;

        let created = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::Validation(e)) if e.has("employee_id")))
            .count();
        assert_eq!((created, rejected), (1, 3));

        remove_file_pool(pool, path).await;
    }
}
