use chrono::{NaiveDate, Utc};

pub mod identity;
pub mod ledger;
pub mod reporting;
pub mod roster;
pub mod workflow;

/// Calendar day attendance is taken for, in UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
