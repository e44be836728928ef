//! Error type for entry-table and property-store operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the entry table and property stores.
#[derive(Debug, Error)]
pub enum EntriesError {
    /// A filesystem operation failed.
    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// The path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// An administrative-area primitive failed.
    #[error(transparent)]
    Adm(#[from] adm::AdmError),

    /// Stored data did not match the expected vocabulary.
    #[error("malformed entry data in '{}': {detail}", path.display())]
    Malformed {
        /// The file that failed to load.
        path: PathBuf,
        /// What went wrong.
        detail: String,
    },
}

impl EntriesError {
    /// Constructs an I/O error with action and path context.
    #[must_use]
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
