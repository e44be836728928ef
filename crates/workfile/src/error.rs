//! Error type for working-file installation.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while staging or installing a working file.
#[derive(Debug, Error)]
pub enum WorkfileError {
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

    /// Translation of the staged content failed.
    #[error(transparent)]
    Translate(#[from] translate::TranslateError),

    /// The writer was used out of order.
    #[error("working-file writer misuse: {detail}")]
    Misuse {
        /// What the caller did wrong.
        detail: &'static str,
    },
}

impl WorkfileError {
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
