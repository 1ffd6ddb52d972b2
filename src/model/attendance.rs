use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    ToSchema,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    #[default]
    Absent,
    Late,
}

/// One ledger row, unique per (student, date).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: i64,

    #[schema(example = 12)]
    pub student_id: i64,

    #[schema(example = "2024-01-03", value_type = String, format = "date")]
    pub date: NaiveDate,

    pub status: AttendanceStatus,

    /// User who last marked this record
    #[schema(example = 2)]
    pub marked_by: i64,

    #[schema(example = "")]
    pub notes: String,

    #[schema(example = "2024-01-03T08:15:00Z", value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,

    #[schema(example = "2024-01-03T08:15:00Z", value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}
