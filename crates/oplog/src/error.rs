//! Common error type for the operation-log engine.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type for log-engine operations.
pub type LogResult<T> = Result<T, LogError>;

/// Error produced while encoding, parsing, or running operation logs.
#[derive(Debug)]
pub struct LogError {
    kind: LogErrorKind,
}

impl LogError {
    fn new(kind: LogErrorKind) -> Self {
        Self { kind }
    }

    /// Constructs an I/O error with action context.
    #[must_use]
    pub fn io(action: &'static str, path: PathBuf, source: io::Error) -> Self {
        Self::new(LogErrorKind::Io {
            action,
            path,
            source,
        })
    }

    /// The very first instruction of a directory's first segment failed:
    /// the log is corrupt from the start.
    #[must_use]
    pub fn bad_log_start(dir: PathBuf, detail: String) -> Self {
        Self::new(LogErrorKind::BadLogStart { dir, detail })
    }

    /// A later instruction failed; `index` is the zero-based position of
    /// the failing top-level element within its segment.
    #[must_use]
    pub fn bad_log(dir: PathBuf, segment: usize, index: usize, detail: String) -> Self {
        Self::new(LogErrorKind::BadLog {
            dir,
            segment,
            index,
            detail,
        })
    }

    /// An instruction element lacked a required attribute.
    #[must_use]
    pub fn missing_attribute(tag: &'static str, attr: &'static str) -> Self {
        Self::new(LogErrorKind::MissingAttribute { tag, attr })
    }

    /// An attribute value did not parse.
    #[must_use]
    pub fn invalid_attribute(tag: &'static str, attr: &'static str, value: &str) -> Self {
        Self::new(LogErrorKind::InvalidAttribute {
            tag,
            attr,
            value: value.to_owned(),
        })
    }

    /// An element tag named no known instruction.
    #[must_use]
    pub fn unknown_instruction(tag: &str) -> Self {
        Self::new(LogErrorKind::UnknownInstruction {
            tag: tag.to_owned(),
        })
    }

    /// An instruction referenced a path that is missing during normal
    /// (non-rerun) execution.
    #[must_use]
    pub fn missing_target(path: PathBuf) -> Self {
        Self::new(LogErrorKind::MissingTarget { path })
    }

    /// An instruction carried a non-relative or escaping path.
    #[must_use]
    pub fn invalid_path(path: &str) -> Self {
        Self::new(LogErrorKind::InvalidPath {
            path: path.to_owned(),
        })
    }

    /// A tree conflict was already recorded for the victim.
    #[must_use]
    pub fn duplicate_conflict(victim: &str) -> Self {
        Self::new(LogErrorKind::DuplicateConflict {
            victim: victim.to_owned(),
        })
    }

    /// The caller's cancellation callback fired.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(LogErrorKind::Cancelled)
    }

    /// Provides access to the underlying error kind.
    #[must_use]
    pub fn kind(&self) -> &LogErrorKind {
        &self.kind
    }

    /// Reports whether this is the "corrupt from the first instruction"
    /// condition callers use for recovery advice.
    #[must_use]
    pub fn is_bad_log_start(&self) -> bool {
        matches!(self.kind, LogErrorKind::BadLogStart { .. })
    }
}

/// The specific failure behind a [`LogError`].
#[derive(Debug)]
#[non_exhaustive]
pub enum LogErrorKind {
    /// I/O failure with action context.
    Io {
        /// What was being attempted.
        action: &'static str,
        /// The path involved.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The first top-level instruction of the first segment failed.
    BadLogStart {
        /// Directory whose log failed.
        dir: PathBuf,
        /// Rendered cause.
        detail: String,
    },
    /// An instruction after the first failed.
    BadLog {
        /// Directory whose log failed.
        dir: PathBuf,
        /// Segment number.
        segment: usize,
        /// Zero-based top-level element index.
        index: usize,
        /// Rendered cause.
        detail: String,
    },
    /// Required attribute absent.
    MissingAttribute {
        /// Instruction tag.
        tag: &'static str,
        /// Attribute name.
        attr: &'static str,
    },
    /// Attribute present but unparsable.
    InvalidAttribute {
        /// Instruction tag.
        tag: &'static str,
        /// Attribute name.
        attr: &'static str,
        /// Offending value.
        value: String,
    },
    /// Unrecognized instruction tag.
    UnknownInstruction {
        /// The tag.
        tag: String,
    },
    /// Missing source/target during normal execution.
    MissingTarget {
        /// The absent path.
        path: PathBuf,
    },
    /// Absolute or escaping instruction path.
    InvalidPath {
        /// The offending path.
        path: String,
    },
    /// Tree conflict already recorded for this victim.
    DuplicateConflict {
        /// The victim's basename.
        victim: String,
    },
    /// Cancellation callback fired between directory recursions.
    Cancelled,
    /// Entry-table failure.
    Entries(entries::EntriesError),
    /// Administrative-area failure.
    Adm(adm::AdmError),
    /// Translation failure.
    Translate(translate::TranslateError),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LogErrorKind::Io {
                action,
                path,
                source,
            } => write!(f, "failed to {action} '{}': {source}", path.display()),
            LogErrorKind::BadLogStart { dir, detail } => write!(
                f,
                "bad administrative log start in '{}': {detail}",
                dir.display()
            ),
            LogErrorKind::BadLog {
                dir,
                segment,
                index,
                detail,
            } => write!(
                f,
                "log segment {segment} of '{}' failed at instruction {index}: {detail}",
                dir.display()
            ),
            LogErrorKind::MissingAttribute { tag, attr } => {
                write!(f, "log instruction '{tag}' is missing attribute '{attr}'")
            }
            LogErrorKind::InvalidAttribute { tag, attr, value } => write!(
                f,
                "log instruction '{tag}' has invalid {attr} '{value}'"
            ),
            LogErrorKind::UnknownInstruction { tag } => {
                write!(f, "unrecognized log instruction '{tag}'")
            }
            LogErrorKind::MissingTarget { path } => {
                write!(f, "log target '{}' is missing", path.display())
            }
            LogErrorKind::InvalidPath { path } => {
                write!(f, "log path '{path}' is not relative to the directory")
            }
            LogErrorKind::DuplicateConflict { victim } => {
                write!(f, "tree conflict already recorded for '{victim}'")
            }
            LogErrorKind::Cancelled => write!(f, "operation cancelled"),
            LogErrorKind::Entries(error) => error.fmt(f),
            LogErrorKind::Adm(error) => error.fmt(f),
            LogErrorKind::Translate(error) => error.fmt(f),
        }
    }
}

impl Error for LogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            LogErrorKind::Io { source, .. } => Some(source),
            LogErrorKind::Entries(error) => Some(error),
            LogErrorKind::Adm(error) => Some(error),
            LogErrorKind::Translate(error) => Some(error),
            _ => None,
        }
    }
}

impl From<entries::EntriesError> for LogError {
    fn from(error: entries::EntriesError) -> Self {
        Self::new(LogErrorKind::Entries(error))
    }
}

impl From<adm::AdmError> for LogError {
    fn from(error: adm::AdmError) -> Self {
        Self::new(LogErrorKind::Adm(error))
    }
}

impl From<translate::TranslateError> for LogError {
    fn from(error: translate::TranslateError) -> Self {
        Self::new(LogErrorKind::Translate(error))
    }
}
