use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};

use crate::db::{is_unique_violation, DatabaseError};
use crate::models::{Gender, NewPatient, Patient, PatientUpdate};

const PATIENT_COLUMNS: &str = "id, first_name, last_name, email, phone, date_of_birth, age, \
     gender, weight, height, blood_type, medical_history, current_medications, allergies, \
     family_history, smoking_status, alcohol_use, created_at, updated_at, is_active";

pub fn insert_patient(
    conn: &Connection,
    new: &NewPatient,
    date_of_birth: Option<NaiveDate>,
    now: NaiveDateTime,
) -> Result<Patient, DatabaseError> {
    conn.execute(
        "INSERT INTO patients (first_name, last_name, email, phone, date_of_birth, age,
         gender, weight, height, blood_type, medical_history, current_medications,
         allergies, family_history, smoking_status, alcohol_use, created_at, updated_at,
         is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, 1)",
        params![
            new.first_name,
            new.last_name,
            new.email,
            new.phone,
            date_of_birth,
            new.age,
            new.gender.as_ref().map(|g| g.as_str()),
            new.weight,
            new.height,
            new.blood_type,
            new.medical_history,
            new.current_medications,
            new.allergies,
            new.family_history,
            new.smoking_status,
            new.alcohol_use,
            now,
            now,
        ],
    )
    .map_err(|e| classify_email_conflict(conn, e, new.email.as_deref()))?;

    let id = conn.last_insert_rowid();
    get_patient_any(conn, id)?.ok_or(DatabaseError::NotFound { entity: "patient", id })
}

/// Fetch an active patient. Normal lookup path: logically deleted rows
/// are invisible here.
pub fn get_patient(conn: &Connection, id: i64) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1 AND is_active = 1"
    );
    fetch_one(conn, &sql, params![id])
}

/// Fetch a patient regardless of the active flag. Update and deactivate
/// paths use this so inactive rows stay reachable.
pub fn get_patient_any(conn: &Connection, id: i64) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1");
    fetch_one(conn, &sql, params![id])
}

/// Email lookup across all patients, active or not. The uniqueness
/// invariant spans deactivated records too.
pub fn get_patient_by_email(conn: &Connection, email: &str) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE email = ?1");
    fetch_one(conn, &sql, params![email])
}

/// Active patients, most recently registered first.
pub fn list_patients(
    conn: &Connection,
    offset: u32,
    limit: u32,
) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE is_active = 1
         ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit, offset], |row| Ok(patient_row_from_rusqlite(row)))?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row??)?);
    }
    Ok(patients)
}

/// Case-insensitive substring match over first name, last name, email,
/// and phone. Active patients only.
pub fn search_patients(conn: &Connection, query: &str) -> Result<Vec<Patient>, DatabaseError> {
    let pattern = format!("%{query}%");
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients WHERE is_active = 1
         AND (LOWER(first_name) LIKE LOWER(?1)
              OR LOWER(last_name) LIKE LOWER(?1)
              OR LOWER(email) LIKE LOWER(?1)
              OR LOWER(phone) LIKE LOWER(?1))
         ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern], |row| Ok(patient_row_from_rusqlite(row)))?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row??)?);
    }
    Ok(patients)
}

pub fn count_active_patients(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM patients WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Apply the provided fields to a patient, active or not. Absent fields
/// are left untouched. Returns `None` when the id never existed.
pub fn update_patient(
    conn: &Connection,
    id: i64,
    update: &PatientUpdate,
    date_of_birth: Option<NaiveDate>,
    now: NaiveDateTime,
) -> Result<Option<Patient>, DatabaseError> {
    let Some(mut patient) = get_patient_any(conn, id)? else {
        return Ok(None);
    };

    if let Some(v) = &update.first_name {
        patient.first_name = v.clone();
    }
    if let Some(v) = &update.last_name {
        patient.last_name = v.clone();
    }
    if let Some(v) = &update.email {
        patient.email = Some(v.clone());
    }
    if let Some(v) = &update.phone {
        patient.phone = Some(v.clone());
    }
    if let Some(v) = date_of_birth {
        patient.date_of_birth = Some(v);
    }
    if let Some(v) = update.age {
        patient.age = Some(v);
    }
    if let Some(v) = &update.gender {
        patient.gender = Some(v.clone());
    }
    if let Some(v) = update.weight {
        patient.weight = Some(v);
    }
    if let Some(v) = update.height {
        patient.height = Some(v);
    }
    if let Some(v) = &update.blood_type {
        patient.blood_type = Some(v.clone());
    }
    if let Some(v) = &update.medical_history {
        patient.medical_history = Some(v.clone());
    }
    if let Some(v) = &update.current_medications {
        patient.current_medications = Some(v.clone());
    }
    if let Some(v) = &update.allergies {
        patient.allergies = Some(v.clone());
    }
    if let Some(v) = &update.family_history {
        patient.family_history = Some(v.clone());
    }
    if let Some(v) = &update.smoking_status {
        patient.smoking_status = Some(v.clone());
    }
    if let Some(v) = &update.alcohol_use {
        patient.alcohol_use = Some(v.clone());
    }
    patient.updated_at = now;

    conn.execute(
        "UPDATE patients SET first_name = ?1, last_name = ?2, email = ?3, phone = ?4,
         date_of_birth = ?5, age = ?6, gender = ?7, weight = ?8, height = ?9,
         blood_type = ?10, medical_history = ?11, current_medications = ?12,
         allergies = ?13, family_history = ?14, smoking_status = ?15, alcohol_use = ?16,
         updated_at = ?17
         WHERE id = ?18",
        params![
            patient.first_name,
            patient.last_name,
            patient.email,
            patient.phone,
            patient.date_of_birth,
            patient.age,
            patient.gender.as_ref().map(|g| g.as_str()),
            patient.weight,
            patient.height,
            patient.blood_type,
            patient.medical_history,
            patient.current_medications,
            patient.allergies,
            patient.family_history,
            patient.smoking_status,
            patient.alcohol_use,
            patient.updated_at,
            id,
        ],
    )
    .map_err(|e| classify_email_conflict(conn, e, patient.email.as_deref()))?;

    Ok(Some(patient))
}

/// Soft delete: mark inactive, keep the row and its history forever.
/// Returns whether the id existed (idempotent on already-inactive rows).
pub fn deactivate_patient(
    conn: &Connection,
    id: i64,
    now: NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(changed > 0)
}

/// Hard delete with cascade to every consultation and child row.
/// Maintenance-only; the normal flow uses [`deactivate_patient`].
pub fn purge_patient(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let removed = conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}

fn fetch_one(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, |row| Ok(patient_row_from_rusqlite(row)))?;
    match rows.next() {
        Some(row) => Ok(Some(patient_from_row(row??)?)),
        None => Ok(None),
    }
}

/// Map a UNIQUE failure on the email column to the conflict error,
/// naming the patient that already holds the address. The constraint is
/// authoritative; any advisory pre-check only improves the message.
fn classify_email_conflict(
    conn: &Connection,
    err: rusqlite::Error,
    email: Option<&str>,
) -> DatabaseError {
    if is_unique_violation(&err) {
        if let Some(email) = email {
            let existing = get_patient_by_email(conn, email).ok().flatten();
            if let Some(existing) = existing {
                return DatabaseError::DuplicateEmail {
                    email: email.to_string(),
                    existing_id: existing.id,
                };
            }
        }
    }
    DatabaseError::Sqlite(err)
}

// Internal row type for Patient mapping
struct PatientRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
    age: Option<i32>,
    gender: Option<String>,
    weight: Option<f64>,
    height: Option<f64>,
    blood_type: Option<String>,
    medical_history: Option<String>,
    current_medications: Option<String>,
    allergies: Option<String>,
    family_history: Option<String>,
    smoking_status: Option<String>,
    alcohol_use: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    is_active: i32,
}

fn patient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PatientRow, rusqlite::Error> {
    Ok(PatientRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        date_of_birth: row.get(5)?,
        age: row.get(6)?,
        gender: row.get(7)?,
        weight: row.get(8)?,
        height: row.get(9)?,
        blood_type: row.get(10)?,
        medical_history: row.get(11)?,
        current_medications: row.get(12)?,
        allergies: row.get(13)?,
        family_history: row.get(14)?,
        smoking_status: row.get(15)?,
        alcohol_use: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        is_active: row.get(19)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: row.id,
        first_name: row.first_name,
        last_name: row.last_name,
        email: row.email,
        phone: row.phone,
        date_of_birth: row.date_of_birth,
        age: row.age,
        gender: row.gender.as_deref().map(Gender::from_str).transpose()?,
        weight: row.weight,
        height: row.height,
        blood_type: row.blood_type,
        medical_history: row.medical_history,
        current_medications: row.current_medications,
        allergies: row.allergies,
        family_history: row.family_history,
        smoking_status: row.smoking_status,
        alcohol_use: row.alcohol_use,
        created_at: row.created_at,
        updated_at: row.updated_at,
        is_active: row.is_active != 0,
    })
}
