use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::{BmiCategory, Gender};
use crate::derived;

/// Patient master record as stored. Derived fields live on
/// [`PatientRecord`], never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub blood_type: Option<String>,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub allergies: Option<String>,
    pub family_history: Option<String>,
    pub smoking_status: Option<String>,
    pub alcohol_use: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_active: bool,
}

/// Fields accepted when registering a patient.
///
/// `date_of_birth` crosses the boundary as a `YYYY-MM-DD` string; the
/// store parses it and rejects anything malformed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub blood_type: Option<String>,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub allergies: Option<String>,
    pub family_history: Option<String>,
    pub smoking_status: Option<String>,
    pub alcohol_use: Option<String>,
}

/// Partial patient update. `None` fields are left untouched: absent,
/// not merely empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub blood_type: Option<String>,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub allergies: Option<String>,
    pub family_history: Option<String>,
    pub smoking_status: Option<String>,
    pub alcohol_use: Option<String>,
}

/// Boundary view of a patient: every stored field plus the derived ones.
#[derive(Debug, Clone, Serialize)]
pub struct PatientRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Effective age: from the birth date when known, else the stored age.
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub bmi: Option<f64>,
    pub bmi_category: Option<BmiCategory>,
    pub blood_type: Option<String>,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub allergies: Option<String>,
    pub family_history: Option<String>,
    pub smoking_status: Option<String>,
    pub alcohol_use: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_active: bool,
    pub total_consultations: i64,
}

impl PatientRecord {
    /// Single construction point for derived fields, so two reads of the
    /// same stored state always agree.
    pub fn from_patient(patient: Patient, total_consultations: i64, today: NaiveDate) -> Self {
        let full_name = derived::full_name(&patient.first_name, &patient.last_name);
        let bmi = match (patient.weight, patient.height) {
            (Some(w), Some(h)) => derived::bmi(w, h),
            _ => None,
        };
        let bmi_category = bmi.map(derived::bmi_category);
        let age = derived::effective_age(patient.date_of_birth, patient.age, today);

        Self {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            full_name,
            email: patient.email,
            phone: patient.phone,
            date_of_birth: patient.date_of_birth,
            age,
            gender: patient.gender,
            weight: patient.weight,
            height: patient.height,
            bmi,
            bmi_category,
            blood_type: patient.blood_type,
            medical_history: patient.medical_history,
            current_medications: patient.current_medications,
            allergies: patient.allergies,
            family_history: patient.family_history,
            smoking_status: patient.smoking_status,
            alcohol_use: patient.alcohol_use,
            created_at: patient.created_at,
            updated_at: patient.updated_at,
            is_active: patient.is_active,
            total_consultations,
        }
    }
}
