use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: i64,
    pub consultation_id: i64,
    pub medication_name: String,
    pub medication_type: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub purpose: Option<String>,
    pub instructions: Option<String>,
    pub warnings: Option<String>,
    pub is_otc: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPrescription {
    pub medication_name: String,
    pub medication_type: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub purpose: Option<String>,
    pub instructions: Option<String>,
    pub warnings: Option<String>,
    pub is_otc: bool,
}
