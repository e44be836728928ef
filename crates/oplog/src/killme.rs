//! The directory-destruction sentinel.
//!
//! Committed deletion of a whole directory cannot be expressed as an
//! in-log file operation: the log lives inside the directory being
//! destroyed. Instead the final act of such a log is dropping a zero-byte
//! `KILLME` marker. Whoever next opens the directory (the same pass, a
//! rerun, or cleanup) sees the marker and hands control here: the
//! directory's versioned contents and administrative area are destroyed,
//! and the parent's entry table learns about the deletion.

use adm::error::AdmError;
use adm::{AdmAccess, fsutil, layout};
use entries::{Entry, EntryTable, NodeKind};
use std::path::Path;

use crate::error::{LogError, LogResult};
use crate::remove;

/// Reports whether the destruction sentinel is present under `dir`.
#[must_use]
pub fn killme_present(dir: &Path) -> bool {
    layout::adm_path(dir, &[layout::ADM_KILLME]).is_file()
}

/// Drops the sentinel. Atomic: after this returns, the directory's fate
/// is sealed even across a crash.
pub(crate) fn drop_killme(access: &AdmAccess) -> LogResult<()> {
    let path = access.adm_path(&[layout::ADM_KILLME]);
    fsutil::write_atomic(&path, b"")
        .map_err(|error| LogError::io("drop destruction sentinel", path, error))
}

/// Executes a pending destruction: tears down `dir` and records the
/// deletion in the parent's entry table.
///
/// The directory's own recorded revision is read first; when it exceeds
/// the parent's, the parent keeps a tombstone entry (`deleted`, at the
/// commit revision) so a later update of the parent knows the child is
/// gone rather than missing. A locked or unversioned parent skips the
/// bookkeeping; destruction itself always proceeds.
pub fn run_killme(dir: &Path) -> LogResult<()> {
    let revision = EntryTable::read(dir)?
        .this_dir()
        .and_then(|entry| entry.revision)
        .unwrap_or(0);

    tracing::info!(dir = %dir.display(), revision, "destroying committed-deleted directory");
    remove::dir_from_revision_control(dir)?;

    let Some(parent) = dir.parent() else {
        return Ok(());
    };
    let Some(name) = dir.file_name().and_then(|name| name.to_str()) else {
        return Ok(());
    };
    if !layout::is_working_copy(parent) {
        return Ok(());
    }
    let parent_access = match AdmAccess::open(parent) {
        Ok(access) => access,
        Err(AdmError::Locked { .. }) => return Ok(()),
        Err(error) => return Err(error.into()),
    };

    let mut table = EntryTable::read(parent)?;
    let parent_revision = table
        .this_dir()
        .and_then(|entry| entry.revision)
        .unwrap_or(0);
    if revision > parent_revision {
        let mut tombstone = Entry::named(name);
        tombstone.kind = NodeKind::Dir;
        tombstone.deleted = true;
        tombstone.revision = Some(revision);
        table.insert(tombstone);
    } else {
        table.remove(name);
    }
    table.write(parent)?;
    parent_access.close()?;
    Ok(())
}
