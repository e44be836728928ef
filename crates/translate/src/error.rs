//! Error type for translation operations.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised during keyword/EOL translation and special-file
/// handling.
#[derive(Debug, Error)]
pub enum TranslateError {
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

    /// A special-file representation did not parse.
    #[error("'{}' is not a valid special-file representation", path.display())]
    MalformedSpecial {
        /// The file holding the representation.
        path: PathBuf,
    },

    /// Special files are not supported on this platform.
    #[error("special files are not supported on this platform")]
    SpecialUnsupported,
}

impl TranslateError {
    /// Constructs an I/O error with action and path context.
    #[must_use]
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}
