use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::forms::StudentForm;
use crate::model::student::Student;
use crate::services::roster;
use crate::services::today;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct RosterParams {
    /// Standard id; blank lists every standard
    #[param(example = "3")]
    pub standard: Option<String>,
    /// Matches first name, last name or roll number, case-insensitively
    #[param(example = "ash")]
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentResponse {
    #[schema(example = "Student Asha Verma added successfully.")]
    pub message: String,
    pub student: Student,
}

/// Active students, optionally filtered
#[utoipa::path(
    get,
    path = "/manage-students",
    params(RosterParams),
    responses(
        (status = 200, description = "Students ordered by standard then roll number", body = [crate::services::roster::StudentListItem]),
        (status = 422, description = "Standard filter is not a number"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn manage_students(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    params: web::Query<RosterParams>,
) -> Result<HttpResponse, AppError> {
    let standard_id = match params.standard.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| AppError::validation("standard", "Select a valid class"))?,
        ),
    };

    let students =
        roster::search_students(pool.get_ref(), standard_id, params.search.as_deref()).await?;
    Ok(HttpResponse::Ok().json(students))
}

/// Enroll a student; admission date is today
#[utoipa::path(
    post,
    path = "/add-student",
    request_body(content = StudentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Student created", body = StudentResponse),
        (status = 422, description = "Field errors, including a duplicate roll number"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(name = "add_student", skip_all, fields(user_id = auth.user_id))]
pub async fn add_student(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    form: web::Form<StudentForm>,
) -> Result<HttpResponse, AppError> {
    let today = today();
    let input = form.validate(today)?;

    let student = roster::create_student(pool.get_ref(), input, today).await?;
    info!(student_id = student.id, "Student added");

    Ok(HttpResponse::Created().json(StudentResponse {
        message: format!("Student {} added successfully.", student.full_name()),
        student,
    }))
}

#[utoipa::path(
    get,
    path = "/edit-student/{id}",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student", body = Student),
        (status = 404, description = "Student not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
pub async fn get_student(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let student = roster::get_student(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(student))
}

#[utoipa::path(
    post,
    path = "/edit-student/{id}",
    params(("id" = i64, Path, description = "Student id")),
    request_body(content = StudentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Student updated", body = StudentResponse),
        (status = 404, description = "Student not found"),
        (status = 422, description = "Field errors, including a duplicate roll number"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(name = "edit_student", skip_all, fields(user_id = auth.user_id))]
pub async fn edit_student(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    form: web::Form<StudentForm>,
) -> Result<HttpResponse, AppError> {
    let student_id = path.into_inner();
    let input = form.validate(today())?;

    let student = roster::update_student(pool.get_ref(), student_id, input).await?;

    Ok(HttpResponse::Ok().json(StudentResponse {
        message: format!("Student {} updated successfully.", student.full_name()),
        student,
    }))
}

/// Soft delete. Past attendance stays in the ledger.
#[utoipa::path(
    post,
    path = "/delete-student/{id}",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student deactivated", body = StudentResponse),
        (status = 404, description = "Student not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Students"
)]
#[instrument(name = "delete_student", skip_all, fields(user_id = auth.user_id))]
pub async fn delete_student(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let student = roster::deactivate_student(pool.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(StudentResponse {
        message: format!("Student {} has been removed.", student.full_name()),
        student,
    }))
}
