use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TeacherProfile {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = 4)]
    pub user_id: i64,
    #[schema(example = "T-0042")]
    pub employee_id: String,
    #[schema(example = "+91-9876543210")]
    pub phone: String,
}
