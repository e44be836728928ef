#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! The working-copy engine: transactional, crash-safe mutation of a
//! Subversion-style working copy through a replayable operation log.
//!
//! Every versioned directory carries a hidden administrative area with
//! its entry table, pristine text bases, cached properties, and pending
//! log segments. Mutating operations never touch those files directly;
//! they batch instructions in a [`LogAccumulator`], persist the batch
//! atomically, and let [`run_log`] execute it. Interrupted passes are
//! finished by [`rerun_log`] or a recursive [`cleanup`].
//!
//! # Crates
//!
//! - `adm` — administrative-area layout, directory locks, the element
//!   codec, atomic file writes.
//! - `entries` — the entry table and its masked-update contract, plus
//!   cached ("wc") properties.
//! - `translate` — keyword and end-of-line translation between
//!   repository-normal and working form.
//! - `workfile` — staged, translated, atomically installed working
//!   files.
//! - `oplog` — the instruction vocabulary, accumulator, runner,
//!   post-commit finalization, destruction sentinel, tree conflicts.

use std::io::{self, Read};

use thiserror::Error;

pub use adm::{AdmAccess, AdmError, Element, layout};
pub use entries::{
    Entry, EntryTable, FieldMask, NodeKind, PropertyList, Schedule, THIS_DIR, Timestamp,
};
pub use oplog::{
    CancelProbe, ConflictAction, ConflictOperation, ConflictReason, LogAccumulator, LogError,
    LogInstruction, TreeConflict, add_tree_conflict, cleanup, killme_present, read_tree_conflicts,
    remove_tree_conflict, rerun_log, run_log, tree_conflict_for, write_log_segment,
};
pub use translate::{EolStyle, Keywords, TranslatingWriter};
pub use workfile::{InstallParams, WorkingFileWriter};

/// Top-level error for facade operations that cross crate seams.
#[derive(Debug, Error)]
pub enum WcError {
    /// Administrative-area failure.
    #[error(transparent)]
    Adm(#[from] AdmError),
    /// Log engine failure.
    #[error(transparent)]
    Log(#[from] LogError),
    /// Working-file installation failure.
    #[error(transparent)]
    Workfile(#[from] workfile::WorkfileError),
    /// Content streaming failure.
    #[error("failed to stream working-file content: {0}")]
    Stream(#[from] io::Error),
}

/// Streams `contents` through a translating writer and installs the
/// result as the working file `name` under `access`.
///
/// Translation, permission bits, and an optional explicit mtime are
/// derived from `params`. Returns the installed file's mtime and size
/// for entry bookkeeping.
pub fn install_working_file(
    access: &AdmAccess,
    name: &str,
    params: &InstallParams<'_>,
    contents: &mut dyn Read,
) -> Result<(filetime::FileTime, u64), WcError> {
    let mut writer = WorkingFileWriter::open(&access.tmp_dir(), name, params)?;
    io::copy(contents, writer.stream()?)?;
    let result = writer.finalize()?;
    writer.install(&access.wc_path(name))?;
    Ok(result)
}
