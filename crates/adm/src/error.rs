//! Error types for administrative-area operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while manipulating a directory's administrative area.
#[derive(Debug, Error)]
pub enum AdmError {
    /// A filesystem operation failed; `action` names what was attempted.
    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        /// Human-readable description of the attempted operation.
        action: &'static str,
        /// Path the operation touched.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The directory is already locked by another access handle.
    #[error("working copy directory '{}' is locked", path.display())]
    Locked {
        /// The directory whose lock could not be acquired.
        path: PathBuf,
    },

    /// The directory has no administrative area.
    #[error("'{}' is not a working copy directory", path.display())]
    NotWorkingCopy {
        /// The directory that was probed.
        path: PathBuf,
    },

    /// Element text failed to parse.
    #[error("malformed administrative data at offset {offset}: {detail}")]
    Codec {
        /// Byte offset into the parsed text.
        offset: usize,
        /// What went wrong.
        detail: String,
    },
}

impl AdmError {
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
