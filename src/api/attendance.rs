use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::services::roster;
use crate::services::workflow;
use crate::services::today;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MarkingDate {
    /// Day to mark, `YYYY-MM-DD`; defaults to today and may not be in the future
    #[param(example = "2024-01-03")]
    pub date: Option<String>,
}

/// Standards a teacher can pick before marking
#[utoipa::path(
    get,
    path = "/take-attendance",
    responses(
        (status = 200, description = "Standards in natural order", body = [crate::services::roster::StandardOverview]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn choose_standard(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let standards = roster::list_standard_overviews(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(standards))
}

/// Roster of a standard with each student's status for the day
#[utoipa::path(
    get,
    path = "/take-attendance/{standard_id}",
    params(
        ("standard_id" = i64, Path, description = "Standard to mark"),
        MarkingDate
    ),
    responses(
        (status = 200, description = "Marking sheet", body = crate::services::workflow::MarkingSheet),
        (status = 404, description = "Standard not found"),
        (status = 422, description = "Invalid or future date"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn take_attendance(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    query: web::Query<MarkingDate>,
) -> Result<HttpResponse, AppError> {
    let standard_id = path.into_inner();
    let date = workflow::resolve_date(query.date.as_deref(), today())?;

    let sheet = workflow::prepare_for_marking(pool.get_ref(), standard_id, date).await?;
    Ok(HttpResponse::Ok().json(sheet))
}

/// Save a day's attendance for a standard
#[utoipa::path(
    post,
    path = "/take-attendance/{standard_id}",
    params(
        ("standard_id" = i64, Path, description = "Standard being marked"),
        MarkingDate
    ),
    request_body(
        content = Object,
        description = "Student id to status (`present`, `absent`, `late`), or to `{status, notes}`",
        content_type = "application/json",
        example = json!({ "12": "present", "13": { "status": "late", "notes": "bus delayed" } })
    ),
    responses(
        (status = 200, description = "Attendance saved", body = crate::services::workflow::SubmitOutcome),
        (status = 400, description = "Attendance data could not be parsed"),
        (status = 404, description = "Standard or student not found; nothing was saved"),
        (status = 422, description = "Invalid or future date"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "submit_attendance", skip(auth, pool, query, body), fields(user_id = auth.user_id, username = %auth.username))]
pub async fn submit_attendance(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    query: web::Query<MarkingDate>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let standard_id = path.into_inner();
    let date = workflow::resolve_date(query.date.as_deref(), today())?;
    let marks = workflow::parse_status_map(&body)?;
    debug!(standard_id, %date, entries = marks.len(), "Attendance submission parsed");

    let outcome =
        workflow::submit_attendance(pool.get_ref(), standard_id, date, &marks, auth.user_id)
            .await?;
    Ok(HttpResponse::Ok().json(outcome))
}
