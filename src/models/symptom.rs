use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::Severity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symptom {
    pub id: i64,
    pub consultation_id: i64,
    pub symptom_name: String,
    pub category: Option<String>,
    pub severity: Option<Severity>,
    pub onset_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

/// One symptom to record with a new consultation. Severity defaults to
/// the parent consultation's severity when not given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSymptom {
    pub symptom_name: String,
    pub category: Option<String>,
    pub severity: Option<Severity>,
    pub onset_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl NewSymptom {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            symptom_name: name.into(),
            ..Self::default()
        }
    }
}
