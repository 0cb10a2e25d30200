//! MedAssist record store — the patient/consultation data layer of the
//! MedAssist clinical assistant.
//!
//! Stores patients, the consultations performed on them, and the
//! symptom/prescription/diagnostic-test rows attached to each
//! consultation, behind search, pagination, and soft-delete semantics.
//! Callers hand in plain scalar values and get plain records back; the
//! HTTP layer, dashboard, and diagnosis generation are external
//! collaborators and live elsewhere.

pub mod config;
pub mod db;
pub mod derived;
pub mod models;

pub use config::{StoreConfig, StoreLocation};
pub use db::{DatabaseError, RecordStore, StoreStats};
