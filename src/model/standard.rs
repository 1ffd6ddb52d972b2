use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use utoipa::ToSchema;

/// Grade labels a standard may carry, "1" through "10".
pub const GRADES: std::ops::RangeInclusive<u8> = 1..=10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({ "id": 3, "name": "5", "section": "A" }))]
pub struct Standard {
    #[schema(example = 3)]
    pub id: i64,
    /// Grade label, "1" through "10"
    #[schema(example = "5")]
    pub name: String,
    #[schema(example = "A")]
    pub section: String,
}

impl Standard {
    /// Numeric grade, unknown labels sort last.
    pub fn grade(&self) -> u8 {
        self.name.parse().unwrap_or(u8::MAX)
    }

    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Natural ordering: numeric grade, then section letter.
    ///
    /// Plain string ordering would put "10" before "2".
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        self.grade()
            .cmp(&other.grade())
            .then_with(|| self.section.cmp(&other.section))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class {}-{}", self.name, self.section)
    }
}

/// Parses a grade label, accepting only "1" through "10".
pub fn parse_grade(raw: &str) -> Option<String> {
    let grade: u8 = raw.trim().parse().ok()?;
    GRADES.contains(&grade).then(|| grade.to_string())
}

/// Parses a section letter, upper-casing it.
pub fn parse_section(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase().to_string()),
        _ => None,
    }
}
