use crate::auth::auth::AuthUser;
use crate::error::{AppError, ValidationErrors};
use crate::forms::parse_date;
use crate::services::reporting::{self, HISTORY_DEFAULT_PER_PAGE, HistoryQuery};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;
use utoipa::IntoParams;

/// Raw query string of the history view. Blank values mean "no filter".
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Standard id
    #[param(example = "3")]
    pub standard: Option<String>,
    /// Student id
    #[param(example = "12")]
    pub student: Option<String>,
    #[param(example = "2024-01-01")]
    pub start_date: Option<String>,
    #[param(example = "2024-01-31")]
    pub end_date: Option<String>,
    #[param(example = "1")]
    pub page: Option<String>,
    /// Capped at 100
    #[param(example = "50")]
    pub per_page: Option<String>,
}

fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn number<T: FromStr>(
    errors: &mut ValidationErrors,
    field: &str,
    raw: &Option<String>,
) -> Option<T> {
    let value = present(raw)?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(field, format!("{value:?} is not a valid number"));
            None
        }
    }
}

fn date(
    errors: &mut ValidationErrors,
    field: &str,
    raw: &Option<String>,
) -> Option<chrono::NaiveDate> {
    let value = present(raw)?;
    let parsed = parse_date(value);
    if parsed.is_none() {
        errors.push(field, format!("{value:?} is not a date (YYYY-MM-DD)"));
    }
    parsed
}

impl HistoryParams {
    pub fn to_query(&self) -> Result<HistoryQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let query = HistoryQuery {
            standard_id: number(&mut errors, "standard", &self.standard),
            student_id: number(&mut errors, "student", &self.student),
            start_date: date(&mut errors, "start_date", &self.start_date),
            end_date: date(&mut errors, "end_date", &self.end_date),
            page: number(&mut errors, "page", &self.page).unwrap_or(1),
            per_page: number(&mut errors, "per_page", &self.per_page)
                .unwrap_or(HISTORY_DEFAULT_PER_PAGE),
        };

        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                errors.push("start_date", "Start date must not be after end date");
            }
        }

        if errors.is_empty() {
            Ok(query)
        } else {
            Err(errors)
        }
    }
}

/// Attendance ledger, filtered and paginated
#[utoipa::path(
    get,
    path = "/view-attendance",
    params(HistoryParams),
    responses(
        (status = 200, description = "Matching records, newest date first", body = crate::services::reporting::HistoryPage),
        (status = 422, description = "A filter could not be parsed"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn view_attendance(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    params: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    let query = params.to_query()?;
    debug!(?query, "History requested");

    let page = reporting::filtered_history(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(page))
}
