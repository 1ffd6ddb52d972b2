use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::forms::TeacherForm;
use crate::services::identity;
use actix_web::{HttpResponse, web};
use sqlx::SqlitePool;
use tracing::instrument;

/// Create a teacher login with its profile (admin only)
#[utoipa::path(
    post,
    path = "/teachers",
    request_body = TeacherForm,
    responses(
        (status = 201, description = "Teacher created", body = crate::services::identity::Identity),
        (status = 403, description = "Admin only"),
        (status = 422, description = "Invalid fields, taken username or employee id, unknown standard"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "create_teacher", skip_all, fields(user_id = auth.user_id))]
pub async fn create_teacher(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    payload: web::Json<TeacherForm>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let input = payload.validate()?;
    let teacher = identity::create_teacher(pool.get_ref(), input).await?;

    Ok(HttpResponse::Created().json(teacher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{admin_in, bearer, teacher_in};
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::services::roster::tests::seed_standard;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn only_admins_create_teachers() {
        let pool = test_pool().await;
        let five = seed_standard(&pool, "5", "A").await;
        let admin = bearer(&admin_in(&pool).await);
        let teacher = bearer(&teacher_in(&pool).await);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .app_data(web::Data::new(Config::for_tests()))
                .route("/teachers", web::post().to(create_teacher)),
        )
        .await;

        let body = json!({
            "username": "mrs.rao",
            "password": "long-enough",
            "first_name": "Lakshmi",
            "last_name": "Rao",
            "employee_id": "T-0042",
            "assigned_standards": [five.id]
        });

        let req = test::TestRequest::post()
            .uri("/teachers")
            .insert_header(("Authorization", teacher))
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/teachers")
            .insert_header(("Authorization", admin.clone()))
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["role"], "teacher");
        assert_eq!(created["assigned_standards"][0]["id"], five.id);

        let req = test::TestRequest::post()
            .uri("/teachers")
            .insert_header(("Authorization", admin))
            .set_json(json!({"username": "x", "password": "short"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
