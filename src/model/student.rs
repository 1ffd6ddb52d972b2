use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 12,
        "standard_id": 3,
        "roll_number": "12",
        "first_name": "Asha",
        "last_name": "Verma",
        "date_of_birth": "2014-06-02",
        "parent_contact": "+91-9876543210",
        "address": "14 MG Road",
        "admission_date": "2024-04-01",
        "is_active": true
    })
)]
pub struct Student {
    #[schema(example = 12)]
    pub id: i64,

    #[schema(example = 3)]
    pub standard_id: i64,

    #[schema(example = "12")]
    pub roll_number: String,

    #[schema(example = "Asha")]
    pub first_name: String,

    #[schema(example = "Verma")]
    pub last_name: String,

    #[schema(example = "2014-06-02", value_type = Option<String>, format = "date")]
    pub date_of_birth: Option<NaiveDate>,

    #[schema(example = "+91-9876543210", nullable = true)]
    pub parent_contact: Option<String>,

    #[schema(example = "14 MG Road", nullable = true)]
    pub address: Option<String>,

    #[schema(example = "2024-04-01", value_type = String, format = "date")]
    pub admission_date: NaiveDate,

    #[schema(example = true)]
    pub is_active: bool,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
