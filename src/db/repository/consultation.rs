use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection};

use crate::db::{is_foreign_key_violation, DatabaseError};
use crate::models::{Consultation, NewConsultation, Severity, Symptom, UrgencyLevel};

const CONSULTATION_COLUMNS: &str = "id, patient_id, consultation_date, chief_complaint, \
     duration_of_symptoms, severity, additional_notes, ai_diagnosis, \
     differential_diagnoses, urgency_level, model_used, model_provider, \
     web_search_enabled, created_at";

/// Create the consultation row and one symptom row per entry in a single
/// transaction: either every row is visible afterwards or none are.
/// Symptom severity defaults to the consultation severity unless given.
pub fn create_consultation(
    conn: &Connection,
    new: &NewConsultation,
    now: NaiveDateTime,
) -> Result<Consultation, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let consultation_date = new.consultation_date.unwrap_or(now);

    tx.execute(
        "INSERT INTO consultations (patient_id, consultation_date, chief_complaint,
         duration_of_symptoms, severity, additional_notes, ai_diagnosis,
         differential_diagnoses, urgency_level, model_used, model_provider,
         web_search_enabled, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            new.patient_id,
            consultation_date,
            new.chief_complaint,
            new.duration_of_symptoms,
            new.severity.as_ref().map(|s| s.as_str()),
            new.additional_notes,
            new.ai_diagnosis,
            new.differential_diagnoses,
            new.urgency_level.as_ref().map(|u| u.as_str()),
            new.model_used,
            new.model_provider,
            new.web_search_enabled as i32,
            now,
        ],
    )
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            DatabaseError::MissingParent {
                child: "consultation",
                parent: "patient",
                id: new.patient_id,
            }
        } else {
            DatabaseError::Sqlite(e)
        }
    })?;

    let consultation_id = tx.last_insert_rowid();
    for symptom in &new.symptoms {
        let severity = symptom.severity.as_ref().or(new.severity.as_ref());
        tx.execute(
            "INSERT INTO symptoms (consultation_id, symptom_name, category, severity,
             onset_date, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                consultation_id,
                symptom.symptom_name,
                symptom.category,
                severity.map(|s| s.as_str()),
                symptom.onset_date,
                symptom.description,
                now,
            ],
        )?;
    }

    // Dropping the transaction without this rolls everything back, so a
    // failed symptom insert leaves no trace of the consultation either.
    tx.commit()?;

    get_consultation(conn, consultation_id)?.ok_or(DatabaseError::NotFound {
        entity: "consultation",
        id: consultation_id,
    })
}

pub fn get_consultation(
    conn: &Connection,
    id: i64,
) -> Result<Option<Consultation>, DatabaseError> {
    let sql = format!("SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], |row| Ok(consultation_row_from_rusqlite(row)))?;
    match rows.next() {
        Some(row) => Ok(Some(consultation_from_row(row??)?)),
        None => Ok(None),
    }
}

/// A patient's consultations, newest first.
pub fn list_consultations_for_patient(
    conn: &Connection,
    patient_id: i64,
    offset: u32,
    limit: u32,
) -> Result<Vec<Consultation>, DatabaseError> {
    let sql = format!(
        "SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE patient_id = ?1
         ORDER BY consultation_date DESC, id DESC LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id, limit, offset], |row| {
        Ok(consultation_row_from_rusqlite(row))
    })?;

    let mut consultations = Vec::new();
    for row in rows {
        consultations.push(consultation_from_row(row??)?);
    }
    Ok(consultations)
}

/// Latest consultations across all patients.
pub fn list_recent_consultations(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<Consultation>, DatabaseError> {
    let sql = format!(
        "SELECT {CONSULTATION_COLUMNS} FROM consultations
         ORDER BY consultation_date DESC, id DESC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit], |row| Ok(consultation_row_from_rusqlite(row)))?;

    let mut consultations = Vec::new();
    for row in rows {
        consultations.push(consultation_from_row(row??)?);
    }
    Ok(consultations)
}

pub fn count_consultations(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM consultations", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_consultations_for_patient(
    conn: &Connection,
    patient_id: i64,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM consultations WHERE patient_id = ?1",
        params![patient_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Consultation counts for a set of patients in one query, used when
/// building a page of patient records.
pub fn count_consultations_by_patients(
    conn: &Connection,
    patient_ids: &[i64],
) -> Result<HashMap<i64, i64>, DatabaseError> {
    if patient_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; patient_ids.len()].join(",");
    let sql = format!(
        "SELECT patient_id, COUNT(*) FROM consultations
         WHERE patient_id IN ({placeholders}) GROUP BY patient_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(patient_ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = HashMap::new();
    for row in rows {
        let (patient_id, count) = row?;
        counts.insert(patient_id, count);
    }
    Ok(counts)
}

/// Symptom rows of a consultation in insertion order.
pub fn symptoms_for_consultation(
    conn: &Connection,
    consultation_id: i64,
) -> Result<Vec<Symptom>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, consultation_id, symptom_name, category, severity, onset_date,
         description, created_at
         FROM symptoms WHERE consultation_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![consultation_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<chrono::NaiveDate>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, NaiveDateTime>(7)?,
        ))
    })?;

    let mut symptoms = Vec::new();
    for row in rows {
        let (id, consultation_id, symptom_name, category, severity, onset_date, description, created_at) =
            row?;
        symptoms.push(Symptom {
            id,
            consultation_id,
            symptom_name,
            category,
            severity: severity.as_deref().map(Severity::from_str).transpose()?,
            onset_date,
            description,
            created_at,
        });
    }
    Ok(symptoms)
}

pub fn count_symptoms(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM symptoms", [], |row| row.get(0))?;
    Ok(count)
}

// Internal row type for Consultation mapping
struct ConsultationRow {
    id: i64,
    patient_id: i64,
    consultation_date: NaiveDateTime,
    chief_complaint: Option<String>,
    duration_of_symptoms: Option<String>,
    severity: Option<String>,
    additional_notes: Option<String>,
    ai_diagnosis: Option<String>,
    differential_diagnoses: Option<String>,
    urgency_level: Option<String>,
    model_used: Option<String>,
    model_provider: Option<String>,
    web_search_enabled: i32,
    created_at: NaiveDateTime,
}

fn consultation_row_from_rusqlite(
    row: &rusqlite::Row<'_>,
) -> Result<ConsultationRow, rusqlite::Error> {
    Ok(ConsultationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        consultation_date: row.get(2)?,
        chief_complaint: row.get(3)?,
        duration_of_symptoms: row.get(4)?,
        severity: row.get(5)?,
        additional_notes: row.get(6)?,
        ai_diagnosis: row.get(7)?,
        differential_diagnoses: row.get(8)?,
        urgency_level: row.get(9)?,
        model_used: row.get(10)?,
        model_provider: row.get(11)?,
        web_search_enabled: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn consultation_from_row(row: ConsultationRow) -> Result<Consultation, DatabaseError> {
    Ok(Consultation {
        id: row.id,
        patient_id: row.patient_id,
        consultation_date: row.consultation_date,
        chief_complaint: row.chief_complaint,
        duration_of_symptoms: row.duration_of_symptoms,
        severity: row.severity.as_deref().map(Severity::from_str).transpose()?,
        additional_notes: row.additional_notes,
        ai_diagnosis: row.ai_diagnosis,
        differential_diagnoses: row.differential_diagnoses,
        urgency_level: row
            .urgency_level
            .as_deref()
            .map(UrgencyLevel::from_str)
            .transpose()?,
        model_used: row.model_used,
        model_provider: row.model_provider,
        web_search_enabled: row.web_search_enabled != 0,
        created_at: row.created_at,
    })
}
