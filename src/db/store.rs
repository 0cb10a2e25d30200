//! Record store facade — the operation surface consumed by the HTTP
//! layer and dashboard.
//!
//! Owns one guarded connection slot. Every operation is a short-lived
//! unit of work: the slot is acquired at the start, revalidated
//! (recycled when too old, reconnected when dropped), and released on
//! every exit path via the guard. Callers pass plain scalar values and
//! get plain records back; dates cross as `YYYY-MM-DD` strings and are
//! parsed here, never further down.

use std::sync::Mutex;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;

use super::{is_connectivity, repository, sqlite, DatabaseError};
use crate::config::{StoreConfig, StoreLocation};
use crate::models::{
    Consultation, ConsultationRecord, DiagnosticTest, NewConsultation, NewDiagnosticTest,
    NewPatient, NewPrescription, Page, Patient, PatientRecord, PatientUpdate, Prescription,
};

pub use super::repository::StoreStats;

/// The patient/consultation data layer.
pub struct RecordStore {
    config: StoreConfig,
    conn: Mutex<Option<LiveConnection>>,
}

struct LiveConnection {
    conn: Connection,
    opened_at: Instant,
}

impl RecordStore {
    /// Open the store and run the idempotent migration chain.
    pub fn open(config: StoreConfig) -> Result<Self, DatabaseError> {
        let conn = connect(&config)?;
        tracing::info!(location = %config.location, "Record store ready");
        Ok(Self {
            config,
            conn: Mutex::new(Some(LiveConnection {
                conn,
                opened_at: Instant::now(),
            })),
        })
    }

    /// In-memory store for tests and ephemeral use.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::open(StoreConfig::in_memory())
    }

    // ── Connectivity guard ──────────────────────────────────

    /// Liveness probe: one trivial round-trip against the store.
    pub fn health_check(&self) -> Result<(), DatabaseError> {
        self.with_conn(|conn| ping(conn).map_err(DatabaseError::from))
    }

    /// Re-run the migration chain. Safe on every process start; applied
    /// versions are skipped.
    pub fn init_schema(&self) -> Result<(), DatabaseError> {
        self.with_conn(sqlite::run_migrations)
    }

    /// Run one unit of work against a live connection.
    ///
    /// The slot is revalidated before use: a disk connection past its
    /// recycle age (or failing the pre-use ping) is closed and reopened,
    /// and a connectivity-class failure drops the handle so the next
    /// operation transparently reconnects. In-memory connections are
    /// never recycled; the database lives inside the handle.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut slot = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;

        let live = match slot.take() {
            Some(live) if !self.should_recycle(&live) => live,
            stale => {
                if stale.is_some() {
                    tracing::warn!("Recycling database connection");
                }
                drop(stale);
                let conn = connect(&self.config)
                    .map_err(|e| DatabaseError::Unavailable(e.to_string()))?;
                LiveConnection {
                    conn,
                    opened_at: Instant::now(),
                }
            }
        };

        let result = f(&live.conn);

        match &result {
            Err(DatabaseError::Sqlite(e)) if is_connectivity(e) => {
                tracing::warn!(error = %e, "Dropping database connection after connectivity failure");
            }
            _ => *slot = Some(live),
        }

        result.map_err(|err| match err {
            DatabaseError::Sqlite(e) if is_connectivity(&e) => {
                DatabaseError::Unavailable(e.to_string())
            }
            other => other,
        })
    }

    fn should_recycle(&self, live: &LiveConnection) -> bool {
        self.config.is_disk()
            && (live.opened_at.elapsed() >= self.config.recycle_after
                || ping(&live.conn).is_err())
    }

    // ── Patients ────────────────────────────────────────────

    pub fn create_patient(&self, new: NewPatient) -> Result<PatientRecord, DatabaseError> {
        require_name("first_name", &new.first_name)?;
        require_name("last_name", &new.last_name)?;
        let date_of_birth = parse_birth_date(new.date_of_birth.as_deref())?;

        self.with_conn(|conn| {
            // Advisory pre-check for a friendlier message; the UNIQUE
            // constraint at insert time remains authoritative.
            if let Some(email) = new.email.as_deref() {
                if let Some(existing) = repository::get_patient_by_email(conn, email)? {
                    return Err(DatabaseError::DuplicateEmail {
                        email: email.to_string(),
                        existing_id: existing.id,
                    });
                }
            }

            let patient =
                repository::insert_patient(conn, &new, date_of_birth, Utc::now().naive_utc())?;
            tracing::debug!(patient_id = patient.id, "Registered patient");
            Ok(PatientRecord::from_patient(patient, 0, today()))
        })
    }

    /// Fetch an active patient; logically deleted rows report not-found.
    pub fn get_patient(&self, id: i64) -> Result<PatientRecord, DatabaseError> {
        self.with_conn(|conn| {
            let patient = repository::get_patient(conn, id)?
                .ok_or(DatabaseError::NotFound { entity: "patient", id })?;
            patient_record(conn, patient)
        })
    }

    /// Active patients, most recently registered first. The limit is
    /// clamped to the configured page-size ceiling; the total is counted
    /// independently of the page.
    pub fn list_patients(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<PatientRecord>, DatabaseError> {
        let limit = self.config.clamp_limit(limit);
        self.with_conn(|conn| {
            let patients = repository::list_patients(conn, offset, limit)?;
            let total = repository::count_active_patients(conn)?;
            Ok(Page::new(total, patient_records(conn, patients)?))
        })
    }

    /// Case-insensitive substring search over name, email, and phone.
    /// An empty query is rejected, not treated as match-all.
    pub fn search_patients(&self, query: &str) -> Result<Vec<PatientRecord>, DatabaseError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(DatabaseError::Invalid {
                field: "query",
                reason: "search text must not be empty".into(),
            });
        }
        self.with_conn(|conn| {
            let patients = repository::search_patients(conn, trimmed)?;
            patient_records(conn, patients)
        })
    }

    /// Apply a partial update. Absent fields are left untouched; the row
    /// is found whether active or not, so deactivated records stay
    /// correctable. A malformed birth date rejects the whole update,
    /// same as on create.
    pub fn update_patient(
        &self,
        id: i64,
        update: PatientUpdate,
    ) -> Result<PatientRecord, DatabaseError> {
        if let Some(first) = &update.first_name {
            require_name("first_name", first)?;
        }
        if let Some(last) = &update.last_name {
            require_name("last_name", last)?;
        }
        let date_of_birth = parse_birth_date(update.date_of_birth.as_deref())?;

        self.with_conn(|conn| {
            let patient = repository::update_patient(
                conn,
                id,
                &update,
                date_of_birth,
                Utc::now().naive_utc(),
            )?
            .ok_or(DatabaseError::NotFound { entity: "patient", id })?;
            tracing::debug!(patient_id = id, "Updated patient");
            patient_record(conn, patient)
        })
    }

    /// Logical delete: the row and its history are retained forever.
    /// Idempotent: deactivating an already-inactive patient succeeds.
    pub fn deactivate_patient(&self, id: i64) -> Result<(), DatabaseError> {
        self.with_conn(|conn| {
            if !repository::deactivate_patient(conn, id, Utc::now().naive_utc())? {
                return Err(DatabaseError::NotFound { entity: "patient", id });
            }
            tracing::info!(patient_id = id, "Deactivated patient");
            Ok(())
        })
    }

    pub fn count_active_patients(&self) -> Result<i64, DatabaseError> {
        self.with_conn(repository::count_active_patients)
    }

    /// Hard delete with cascade through every consultation and child
    /// row. Maintenance-only, deliberately separate from
    /// [`deactivate_patient`](Self::deactivate_patient), since this one
    /// is irreversible.
    pub fn purge_patient(&self, id: i64) -> Result<(), DatabaseError> {
        self.with_conn(|conn| {
            if !repository::purge_patient(conn, id)? {
                return Err(DatabaseError::NotFound { entity: "patient", id });
            }
            tracing::warn!(patient_id = id, "Hard-deleted patient and all consultations");
            Ok(())
        })
    }

    // ── Consultations ───────────────────────────────────────

    /// Record a consultation and its symptom rows as one all-or-nothing
    /// transaction. The patient may be inactive but must exist.
    pub fn create_consultation(
        &self,
        new: NewConsultation,
    ) -> Result<ConsultationRecord, DatabaseError> {
        for symptom in &new.symptoms {
            require_name("symptom_name", &symptom.symptom_name)?;
        }

        self.with_conn(|conn| {
            // Pre-check for the message; the FOREIGN KEY stays authoritative.
            if repository::get_patient_any(conn, new.patient_id)?.is_none() {
                return Err(DatabaseError::MissingParent {
                    child: "consultation",
                    parent: "patient",
                    id: new.patient_id,
                });
            }

            let consultation =
                repository::create_consultation(conn, &new, Utc::now().naive_utc())?;
            tracing::debug!(
                consultation_id = consultation.id,
                patient_id = consultation.patient_id,
                symptoms = new.symptoms.len(),
                "Recorded consultation"
            );
            consultation_record(conn, consultation)
        })
    }

    pub fn get_consultation(&self, id: i64) -> Result<ConsultationRecord, DatabaseError> {
        self.with_conn(|conn| {
            let consultation = repository::get_consultation(conn, id)?
                .ok_or(DatabaseError::NotFound { entity: "consultation", id })?;
            consultation_record(conn, consultation)
        })
    }

    /// A patient's consultations, newest first, with an independent
    /// total count.
    pub fn list_consultations_for_patient(
        &self,
        patient_id: i64,
        offset: u32,
        limit: u32,
    ) -> Result<Page<ConsultationRecord>, DatabaseError> {
        let limit = self.config.clamp_limit(limit);
        self.with_conn(|conn| {
            let consultations =
                repository::list_consultations_for_patient(conn, patient_id, offset, limit)?;
            let total = repository::count_consultations_for_patient(conn, patient_id)?;
            Ok(Page::new(total, consultation_records(conn, consultations)?))
        })
    }

    /// Latest consultations across all patients.
    pub fn list_recent_consultations(
        &self,
        limit: u32,
    ) -> Result<Page<ConsultationRecord>, DatabaseError> {
        let limit = self.config.clamp_limit(limit);
        self.with_conn(|conn| {
            let consultations = repository::list_recent_consultations(conn, limit)?;
            let total = repository::count_consultations(conn)?;
            Ok(Page::new(total, consultation_records(conn, consultations)?))
        })
    }

    pub fn count_consultations(&self) -> Result<i64, DatabaseError> {
        self.with_conn(repository::count_consultations)
    }

    pub fn count_consultations_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<i64, DatabaseError> {
        self.with_conn(|conn| repository::count_consultations_for_patient(conn, patient_id))
    }

    /// Append one prescription to an existing consultation.
    pub fn append_prescription(
        &self,
        consultation_id: i64,
        new: NewPrescription,
    ) -> Result<Prescription, DatabaseError> {
        require_name("medication_name", &new.medication_name)?;
        self.with_conn(|conn| {
            let prescription = repository::insert_prescription(
                conn,
                consultation_id,
                &new,
                Utc::now().naive_utc(),
            )?;
            tracing::debug!(consultation_id, prescription_id = prescription.id, "Appended prescription");
            Ok(prescription)
        })
    }

    /// Append one recommended diagnostic test to an existing consultation.
    pub fn append_diagnostic_test(
        &self,
        consultation_id: i64,
        new: NewDiagnosticTest,
    ) -> Result<DiagnosticTest, DatabaseError> {
        require_name("test_name", &new.test_name)?;
        self.with_conn(|conn| {
            let test = repository::insert_diagnostic_test(
                conn,
                consultation_id,
                &new,
                Utc::now().naive_utc(),
            )?;
            tracing::debug!(consultation_id, test_id = test.id, "Appended diagnostic test");
            Ok(test)
        })
    }

    /// Every prescription across a patient's consultations, newest
    /// first. The patient may be inactive; history stays readable.
    pub fn get_prescriptions_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Prescription>, DatabaseError> {
        self.with_conn(|conn| {
            if repository::get_patient_any(conn, patient_id)?.is_none() {
                return Err(DatabaseError::NotFound {
                    entity: "patient",
                    id: patient_id,
                });
            }
            repository::prescriptions_for_patient(conn, patient_id)
        })
    }

    // ── Aggregates & maintenance ────────────────────────────

    /// Best-effort aggregate snapshot.
    pub fn stats(&self) -> Result<StoreStats, DatabaseError> {
        self.with_conn(repository::collect_stats)
    }

    /// Drop every table. Irreversible; dev/test only, never part of the
    /// request flow. [`init_schema`](Self::init_schema) rebuilds.
    pub fn drop_schema(&self) -> Result<(), DatabaseError> {
        self.with_conn(sqlite::drop_schema)
    }
}

fn connect(config: &StoreConfig) -> Result<Connection, DatabaseError> {
    match &config.location {
        StoreLocation::Disk(path) => sqlite::open_database(path),
        StoreLocation::Memory => sqlite::open_memory_database(),
    }
}

fn ping(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT 1", [], |_| Ok(()))
}

fn require_name(field: &'static str, value: &str) -> Result<(), DatabaseError> {
    if value.trim().is_empty() {
        return Err(DatabaseError::Invalid {
            field,
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

/// Boundary date parsing: `YYYY-MM-DD` or a validation error, applied
/// uniformly on create and update.
fn parse_birth_date(raw: Option<&str>) -> Result<Option<NaiveDate>, DatabaseError> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| DatabaseError::Invalid {
            field: "date_of_birth",
            reason: format!("'{s}' is not a YYYY-MM-DD date"),
        })
    })
    .transpose()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn patient_record(conn: &Connection, patient: Patient) -> Result<PatientRecord, DatabaseError> {
    let total = repository::count_consultations_for_patient(conn, patient.id)?;
    Ok(PatientRecord::from_patient(patient, total, today()))
}

fn patient_records(
    conn: &Connection,
    patients: Vec<Patient>,
) -> Result<Vec<PatientRecord>, DatabaseError> {
    let ids: Vec<i64> = patients.iter().map(|p| p.id).collect();
    let counts = repository::count_consultations_by_patients(conn, &ids)?;
    let today = today();
    Ok(patients
        .into_iter()
        .map(|patient| {
            let total = counts.get(&patient.id).copied().unwrap_or(0);
            PatientRecord::from_patient(patient, total, today)
        })
        .collect())
}

fn consultation_record(
    conn: &Connection,
    consultation: Consultation,
) -> Result<ConsultationRecord, DatabaseError> {
    let symptoms = repository::symptoms_for_consultation(conn, consultation.id)?;
    let prescriptions = repository::prescriptions_for_consultation(conn, consultation.id)?;
    let tests = repository::tests_for_consultation(conn, consultation.id)?;
    Ok(ConsultationRecord {
        consultation,
        symptoms,
        prescriptions,
        tests,
    })
}

fn consultation_records(
    conn: &Connection,
    consultations: Vec<Consultation>,
) -> Result<Vec<ConsultationRecord>, DatabaseError> {
    consultations
        .into_iter()
        .map(|consultation| consultation_record(conn, consultation))
        .collect()
}
