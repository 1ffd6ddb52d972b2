//! Typed input forms. Each form deserializes leniently (every field is raw
//! text) and exposes a single `validate()` that either produces the checked
//! value or the full list of field errors.

use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::ValidationErrors;
use crate::model::standard::{parse_grade, parse_section};

const ROLL_NUMBER_MAX: usize = 10;
const NAME_MAX: usize = 50;
const CONTACT_MAX: usize = 15;
const EMPLOYEE_ID_MAX: usize = 20;

/// Student create/update form, posted as `application/x-www-form-urlencoded`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct StudentForm {
    #[schema(example = "12")]
    pub roll_number: String,
    #[schema(example = "Asha")]
    pub first_name: String,
    #[schema(example = "Verma")]
    pub last_name: String,
    /// Standard id
    #[schema(example = "3")]
    pub standard: String,
    #[schema(example = "2014-06-02")]
    pub date_of_birth: Option<String>,
    #[schema(example = "+91-9876543210")]
    pub parent_contact: Option<String>,
    #[schema(example = "14 MG Road")]
    pub address: Option<String>,
}

/// A student form that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidStudent {
    pub roll_number: String,
    pub first_name: String,
    pub last_name: String,
    pub standard_id: i64,
    pub date_of_birth: Option<NaiveDate>,
    pub parent_contact: Option<String>,
    pub address: Option<String>,
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    raw: &str,
    max: usize,
) -> String {
    let value = raw.trim();
    if value.is_empty() {
        errors.push(field, format!("{label} is required"));
    } else if value.chars().count() > max {
        errors.push(field, format!("{label} must be at most {max} characters"));
    }
    value.to_string()
}

/// Trims an optional field, treating blank input as absent.
fn optional_text(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

impl StudentForm {
    /// Field-level checks. Standard existence and roll-number uniqueness need
    /// the database and are checked by the roster store.
    pub fn validate(&self, today: NaiveDate) -> Result<ValidStudent, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let roll_number = required_text(
            &mut errors,
            "roll_number",
            "Roll number",
            &self.roll_number,
            ROLL_NUMBER_MAX,
        );
        let first_name = required_text(
            &mut errors,
            "first_name",
            "First name",
            &self.first_name,
            NAME_MAX,
        );
        let last_name = required_text(
            &mut errors,
            "last_name",
            "Last name",
            &self.last_name,
            NAME_MAX,
        );

        let standard_id = match self.standard.trim().parse::<i64>() {
            Ok(id) if id > 0 => id,
            _ => {
                errors.push("standard", "Select a valid class");
                0
            }
        };

        let date_of_birth = match optional_text(&self.date_of_birth) {
            None => None,
            Some(raw) => match parse_date(&raw) {
                Some(dob) if dob > today => {
                    errors.push("date_of_birth", "Date of birth cannot be in the future");
                    None
                }
                Some(dob) => Some(dob),
                None => {
                    errors.push("date_of_birth", "Enter a valid date (YYYY-MM-DD)");
                    None
                }
            },
        };

        let parent_contact = optional_text(&self.parent_contact);
        if let Some(contact) = &parent_contact {
            if contact.chars().count() > CONTACT_MAX {
                errors.push(
                    "parent_contact",
                    format!("Parent contact must be at most {CONTACT_MAX} characters"),
                );
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidStudent {
            roll_number,
            first_name,
            last_name,
            standard_id,
            date_of_birth,
            parent_contact,
            address: optional_text(&self.address),
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct StandardForm {
    #[schema(example = "5")]
    pub name: String,
    /// Defaults to "A"
    #[schema(example = "A")]
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidStandard {
    pub name: String,
    pub section: String,
}

impl StandardForm {
    pub fn validate(&self) -> Result<ValidStandard, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = parse_grade(&self.name).unwrap_or_else(|| {
            errors.push("name", "Class must be between 1 and 10");
            String::new()
        });

        let section = match optional_text(&self.section) {
            None => "A".to_string(),
            Some(raw) => parse_section(&raw).unwrap_or_else(|| {
                errors.push("section", "Section must be a single letter");
                String::new()
            }),
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidStandard { name, section })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct TeacherForm {
    #[schema(example = "mrs.rao")]
    pub username: String,
    pub password: String,
    #[schema(example = "Lakshmi")]
    pub first_name: String,
    #[schema(example = "Rao")]
    pub last_name: String,
    #[schema(example = "T-0042")]
    pub employee_id: String,
    #[schema(example = "+91-9876543210")]
    pub phone: Option<String>,
    /// Standard ids the teacher is assigned to
    #[schema(example = json!([1, 3]))]
    pub assigned_standards: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTeacher {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub employee_id: String,
    pub phone: String,
    pub assigned_standards: Vec<i64>,
}

impl TeacherForm {
    pub fn validate(&self) -> Result<ValidTeacher, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let username = required_text(&mut errors, "username", "Username", &self.username, 150);
        if self.password.len() < 8 {
            errors.push("password", "Password must be at least 8 characters");
        }
        let employee_id = required_text(
            &mut errors,
            "employee_id",
            "Employee id",
            &self.employee_id,
            EMPLOYEE_ID_MAX,
        );
        let phone = optional_text(&self.phone).unwrap_or_default();
        if phone.chars().count() > CONTACT_MAX {
            errors.push(
                "phone",
                format!("Phone must be at most {CONTACT_MAX} characters"),
            );
        }

        let mut assigned_standards = self.assigned_standards.clone();
        assigned_standards.sort_unstable();
        assigned_standards.dedup();

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidTeacher {
            username,
            password: self.password.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            employee_id,
            phone,
            assigned_standards,
        })
    }
}
