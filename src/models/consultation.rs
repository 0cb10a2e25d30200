use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::diagnostic_test::DiagnosticTest;
use super::enums::{Severity, UrgencyLevel};
use super::prescription::Prescription;
use super::symptom::{NewSymptom, Symptom};

/// One diagnostic encounter, owned by exactly one patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: i64,
    pub patient_id: i64,
    pub consultation_date: NaiveDateTime,
    pub chief_complaint: Option<String>,
    pub duration_of_symptoms: Option<String>,
    pub severity: Option<Severity>,
    pub additional_notes: Option<String>,
    pub ai_diagnosis: Option<String>,
    pub differential_diagnoses: Option<String>,
    pub urgency_level: Option<UrgencyLevel>,
    pub model_used: Option<String>,
    pub model_provider: Option<String>,
    pub web_search_enabled: bool,
    pub created_at: NaiveDateTime,
}

/// A consultation to create, together with its symptom rows. The whole
/// unit commits or rolls back as one transaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewConsultation {
    pub patient_id: i64,
    /// Defaults to the creation time when absent.
    pub consultation_date: Option<NaiveDateTime>,
    pub chief_complaint: Option<String>,
    pub duration_of_symptoms: Option<String>,
    pub severity: Option<Severity>,
    pub additional_notes: Option<String>,
    pub ai_diagnosis: Option<String>,
    pub differential_diagnoses: Option<String>,
    pub urgency_level: Option<UrgencyLevel>,
    pub model_used: Option<String>,
    pub model_provider: Option<String>,
    pub web_search_enabled: bool,
    pub symptoms: Vec<NewSymptom>,
}

/// Boundary view of a consultation with its child rows nested.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationRecord {
    #[serde(flatten)]
    pub consultation: Consultation,
    pub symptoms: Vec<Symptom>,
    pub prescriptions: Vec<Prescription>,
    pub tests: Vec<DiagnosticTest>,
}
