use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::forms::StandardForm;
use crate::services::roster;
use actix_web::{HttpResponse, web};
use sqlx::SqlitePool;
use tracing::info;

#[utoipa::path(
    get,
    path = "/standards",
    responses(
        (status = 200, description = "Standards in natural order with active-student counts", body = [crate::services::roster::StandardOverview]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Standards"
)]
pub async fn list_standards(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
) -> Result<HttpResponse, AppError> {
    let standards = roster::list_standard_overviews(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(standards))
}

/// Create a standard (admin only)
#[utoipa::path(
    post,
    path = "/standards",
    request_body = StandardForm,
    responses(
        (status = 201, description = "Standard created", body = crate::model::standard::Standard),
        (status = 403, description = "Admin only"),
        (status = 422, description = "Invalid grade or section, or the standard already exists"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Standards"
)]
pub async fn create_standard(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<StandardForm>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let input = payload.validate()?;
    let standard = roster::create_standard(pool.get_ref(), input).await?;
    info!(user_id = auth.user_id, standard = %standard, "Standard added");

    Ok(HttpResponse::Created().json(standard))
}
