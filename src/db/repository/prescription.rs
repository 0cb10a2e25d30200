use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::db::{is_foreign_key_violation, DatabaseError};
use crate::models::{NewPrescription, Prescription};

const PRESCRIPTION_COLUMNS: &str = "id, consultation_id, medication_name, medication_type, \
     dosage, frequency, duration, purpose, instructions, warnings, is_otc, created_at";

/// Append one prescription to an existing consultation. Fails with a
/// referential error when the consultation does not exist.
pub fn insert_prescription(
    conn: &Connection,
    consultation_id: i64,
    new: &NewPrescription,
    now: NaiveDateTime,
) -> Result<Prescription, DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (consultation_id, medication_name, medication_type,
         dosage, frequency, duration, purpose, instructions, warnings, is_otc, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            consultation_id,
            new.medication_name,
            new.medication_type,
            new.dosage,
            new.frequency,
            new.duration,
            new.purpose,
            new.instructions,
            new.warnings,
            new.is_otc as i32,
            now,
        ],
    )
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            DatabaseError::MissingParent {
                child: "prescription",
                parent: "consultation",
                id: consultation_id,
            }
        } else {
            DatabaseError::Sqlite(e)
        }
    })?;

    let id = conn.last_insert_rowid();
    get_prescription(conn, id)?.ok_or(DatabaseError::NotFound {
        entity: "prescription",
        id,
    })
}

pub fn get_prescription(
    conn: &Connection,
    id: i64,
) -> Result<Option<Prescription>, DatabaseError> {
    let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], prescription_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn prescriptions_for_consultation(
    conn: &Connection,
    consultation_id: i64,
) -> Result<Vec<Prescription>, DatabaseError> {
    let sql = format!(
        "SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions
         WHERE consultation_id = ?1 ORDER BY id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![consultation_id], prescription_from_row)?;
    let mut prescriptions = Vec::new();
    for row in rows {
        prescriptions.push(row?);
    }
    Ok(prescriptions)
}

/// Every prescription across all of a patient's consultations, newest
/// first.
pub fn prescriptions_for_patient(
    conn: &Connection,
    patient_id: i64,
) -> Result<Vec<Prescription>, DatabaseError> {
    let sql = format!(
        "SELECT p.id, p.consultation_id, p.medication_name, p.medication_type, p.dosage,
         p.frequency, p.duration, p.purpose, p.instructions, p.warnings, p.is_otc,
         p.created_at
         FROM prescriptions p
         JOIN consultations c ON c.id = p.consultation_id
         WHERE c.patient_id = ?1
         ORDER BY p.created_at DESC, p.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id], prescription_from_row)?;
    let mut prescriptions = Vec::new();
    for row in rows {
        prescriptions.push(row?);
    }
    Ok(prescriptions)
}

pub fn count_prescriptions(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM prescriptions", [], |row| row.get(0))?;
    Ok(count)
}

fn prescription_from_row(row: &rusqlite::Row<'_>) -> Result<Prescription, rusqlite::Error> {
    Ok(Prescription {
        id: row.get(0)?,
        consultation_id: row.get(1)?,
        medication_name: row.get(2)?,
        medication_type: row.get(3)?,
        dosage: row.get(4)?,
        frequency: row.get(5)?,
        duration: row.get(6)?,
        purpose: row.get(7)?,
        instructions: row.get(8)?,
        warnings: row.get(9)?,
        is_otc: row.get::<_, i32>(10)? != 0,
        created_at: row.get(11)?,
    })
}
