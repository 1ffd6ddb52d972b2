use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::services::reporting::{self, LedgerView, StandardSummary};
use crate::services::{roster, today};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    #[schema(example = "2024-01-03", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = 12)]
    pub total_standards: usize,
    #[schema(example = 240)]
    pub total_students: i64,
    pub standards: Vec<StandardSummary>,
    pub recent_attendance: Vec<LedgerView>,
}

/// Today's per-standard attendance and the latest ledger activity
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let date = today();

    let standards = reporting::daily_summary(pool.get_ref(), date).await?;
    let recent_attendance = reporting::recent_activity(
        pool.get_ref(),
        date,
        config.recent_activity_days,
        config.recent_activity_limit,
    )
    .await?;
    let total_students = roster::count_active_students(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(DashboardResponse {
        date,
        total_standards: standards.len(),
        total_students,
        standards,
        recent_attendance,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, teacher_in};
    use crate::db::test_pool;
    use crate::model::attendance::AttendanceStatus;
    use crate::services::roster::tests::{seed_standard, seed_student};
    use crate::services::workflow::{StatusMap, submit_attendance};
    use actix_web::{App, test};
    use serde_json::Value;

    #[actix_web::test]
    async fn dashboard_reflects_todays_marking() {
        let pool = test_pool().await;
        let std = seed_standard(&pool, "5", "A").await;
        seed_standard(&pool, "1", "B").await;
        let a = seed_student(&pool, std.id, "1").await;
        let b = seed_student(&pool, std.id, "2").await;
        let user = teacher_in(&pool).await;

        let marks: StatusMap = [
            (a.id, AttendanceStatus::Present),
            (b.id, AttendanceStatus::Absent),
        ]
        .into_iter()
        .collect();
        submit_attendance(&pool, std.id, today(), &marks, user.user_id)
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .app_data(web::Data::new(Config::for_tests()))
                .route("/dashboard", web::get().to(dashboard)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/dashboard")
            .insert_header(("Authorization", bearer(&user)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["total_standards"], 2);
        assert_eq!(body["total_students"], 2);
        assert_eq!(body["standards"][0]["label"], "Class 1-B");
        assert_eq!(body["standards"][1]["present_today"], 1);
        assert_eq!(body["standards"][1]["percentage"], 50.0);
        assert_eq!(body["recent_attendance"].as_array().map(Vec::len), Some(2));
    }
}
