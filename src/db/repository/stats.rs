use rusqlite::Connection;
use serde::Serialize;

use super::{consultation, patient, prescription};
use crate::db::DatabaseError;

/// Aggregate counts across the store. A best-effort snapshot: the four
/// counts run back to back on one connection and are not required to be
/// mutually transactional.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_patients: i64,
    pub total_consultations: i64,
    pub total_symptoms: i64,
    pub total_prescriptions: i64,
}

pub fn collect_stats(conn: &Connection) -> Result<StoreStats, DatabaseError> {
    Ok(StoreStats {
        total_patients: patient::count_active_patients(conn)?,
        total_consultations: consultation::count_consultations(conn)?,
        total_symptoms: consultation::count_symptoms(conn)?,
        total_prescriptions: prescription::count_prescriptions(conn)?,
    })
}
