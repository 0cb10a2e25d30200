pub mod repository;
pub mod sqlite;
pub mod store;

pub use sqlite::*;
pub use store::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("email '{email}' is already registered to patient #{existing_id}")]
    DuplicateEmail { email: String, existing_id: i64 },

    #[error("invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("{child} references missing {parent} #{id}")]
    MissingParent {
        child: &'static str,
        parent: &'static str,
        id: i64,
    },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("internal lock error")]
    LockPoisoned,
}

impl DatabaseError {
    /// Whether retrying the operation may succeed (connectivity-class
    /// failure, as opposed to a validation/conflict/not-found outcome).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// UNIQUE constraint failure (duplicate email).
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// FOREIGN KEY constraint failure (child row naming a missing parent).
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// Connectivity-class failure: the connection, not the statement, is the
/// problem. The store drops the handle and reconnects on next use.
pub(crate) fn is_connectivity(err: &rusqlite::Error) -> bool {
    use rusqlite::ErrorCode::*;
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                DatabaseBusy | DatabaseLocked | SystemIoFailure | CannotOpen | NotADatabase
            )
    )
}
