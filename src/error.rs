//! Error handling for task-migrate
//!
//! Every failure the migration core can produce is a variant of
//! [`MigrateError`]. Nothing is recovered internally: errors carry enough
//! context to be printed as-is by the binary.

use std::path::PathBuf;

use thiserror::Error;

use crate::migrator::MigrationState;

/// Main error type for the migration core
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Migrations directory missing or unreadable
    #[error("failed to read migrations directory {}", path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A filename does not start with a base-10 digit
    #[error("failed to parse order key from {name:?}: file names must start with a digit")]
    OrderKeyParse { name: String },

    /// Version store read failure
    #[error("failed to read version store: {0}")]
    StoreRead(String),

    /// Version store write failure
    #[error("failed to write version store: {0}")]
    StoreWrite(String),

    /// Lookup returned no record
    #[error("migration record not found: {0}")]
    NotFound(String),

    /// Insert of a name that is already recorded
    #[error("migration {0:?} is already recorded")]
    DuplicateName(String),

    /// The external task run reported failure
    #[error("failed to execute migration {name}: {detail}")]
    Execution { name: String, detail: String },

    /// An `up` run stopped at `name` after `applied` units were recorded
    #[error("migration run halted at {name} after {applied} applied")]
    Halted {
        applied: usize,
        name: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// Controller state machine misuse
    #[error("cannot transition from {from} to {to}")]
    InvalidTransition {
        from: MigrationState,
        to: MigrationState,
    },

    /// IO errors outside of directory scanning
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, MigrateError>;

impl MigrateError {
    /// Create a store read error
    pub fn store_read(msg: impl Into<String>) -> Self {
        Self::StoreRead(msg.into())
    }

    /// Create a store write error
    pub fn store_write(msg: impl Into<String>) -> Self {
        Self::StoreWrite(msg.into())
    }

    /// Create an execution error for the named unit
    pub fn execution(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Execution {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// True for the "no record" condition, which callers may treat as empty
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Number of units recorded before an `up` run stopped, if this error
    /// came from one.
    pub fn applied_before_failure(&self) -> Option<usize> {
        match self {
            Self::Halted { applied, .. } => Some(*applied),
            _ => None,
        }
    }
}
