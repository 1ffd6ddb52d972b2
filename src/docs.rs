use crate::api::dashboard::DashboardResponse;
use crate::api::student::StudentResponse;
use crate::auth::handlers::LoginResponse;
use crate::error::FieldError;
use crate::forms::{StandardForm, StudentForm, TeacherForm};
use crate::model::attendance::AttendanceStatus;
use crate::model::standard::Standard;
use crate::model::student::Student;
use crate::model::teacher_profile::TeacherProfile;
use crate::models::LoginReqDto;
use crate::services::identity::Identity;
use crate::services::reporting::{HistoryPage, LedgerView, StandardSummary};
use crate::services::roster::{StandardOverview, StudentListItem};
use crate::services::workflow::{MarkingRow, MarkingSheet, SubmitOutcome};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gurukul Attendance API",
        version = "1.0.0",
        description = r#"
## School attendance tracker

Teachers pick a class, mark each student present, absent or late for a day,
and review the results.

### Key Features
- **Attendance**
  - Marking sheet per class and day, saved as one batch
  - Filtered, paginated attendance history
- **Dashboard**
  - Today's attendance percentage per class and the latest marking activity
- **Students**
  - Add, edit and remove students (removal keeps their attendance history)
- **Administration**
  - Classes (standards 1 to 10, with sections) and teacher accounts

### Security
Every endpoint except `/login`, `/refresh` and `/logout` needs a
**JWT Bearer** access token. Creating classes and teachers is admin only.

### Errors
Failures are JSON: `{"error": "<kind>", "message": "..."}`; validation
failures add a `fields` list.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::dashboard::dashboard,

        crate::api::attendance::choose_standard,
        crate::api::attendance::take_attendance,
        crate::api::attendance::submit_attendance,
        crate::api::history::view_attendance,

        crate::api::student::manage_students,
        crate::api::student::add_student,
        crate::api::student::get_student,
        crate::api::student::edit_student,
        crate::api::student::delete_student,

        crate::api::standard::list_standards,
        crate::api::standard::create_standard,

        crate::api::teacher::create_teacher
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            Identity,
            TeacherProfile,
            TeacherForm,
            DashboardResponse,
            StandardSummary,
            LedgerView,
            AttendanceStatus,
            MarkingRow,
            MarkingSheet,
            SubmitOutcome,
            HistoryPage,
            Standard,
            StandardOverview,
            StandardForm,
            Student,
            StudentForm,
            StudentListItem,
            StudentResponse,
            FieldError
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, sessions and accounts"),
        (name = "Dashboard", description = "Daily overview"),
        (name = "Attendance", description = "Marking and history"),
        (name = "Students", description = "Student roster"),
        (name = "Standards", description = "Classes"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/login",
            "/dashboard",
            "/take-attendance/{standard_id}",
            "/view-attendance",
            "/add-student",
            "/delete-student/{id}",
            "/teachers",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
        assert!(
            doc.components
                .as_ref()
                .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"))
        );
    }
}
