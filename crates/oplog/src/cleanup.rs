//! Recursive recovery of an interrupted working copy.
//!
//! Cleanup walks the tree top-down. In each directory it honors a
//! pending destruction sentinel, clears stale scratch files, and reruns
//! whatever log segments were left behind, then releases the lock before
//! descending so a child's destruction can reach back into the parent's
//! entry table. The cancellation callback is polled between directory
//! recursions only; a single directory's log pass always runs to
//! completion once started.

use std::fs;
use std::path::Path;

use adm::{AdmAccess, layout};
use entries::{EntryTable, NodeKind};

use crate::error::{LogError, LogResult};
use crate::killme;
use crate::runner;

/// A caller-supplied cancellation probe; `true` aborts the walk.
pub type CancelProbe<'a> = &'a dyn Fn() -> bool;

/// Recovers `dir` and every versioned directory below it.
pub fn cleanup(dir: &Path, cancel: Option<CancelProbe<'_>>) -> LogResult<()> {
    if let Some(probe) = cancel
        && probe()
    {
        return Err(LogError::cancelled());
    }

    if killme::killme_present(dir) {
        return killme::run_killme(dir);
    }

    // A crashed operation leaves its advisory lock behind; cleanup is
    // the one caller entitled to break it.
    let stale_lock = layout::adm_path(dir, &[layout::ADM_LOCK]);
    adm::fsutil::remove_file_if_present(&stale_lock)
        .map_err(|error| LogError::io("break stale lock", stale_lock, error))?;

    let access = AdmAccess::open(dir)?;
    clear_scratch(&access)?;
    runner::rerun_log(&access)?;
    let children: Vec<String> = EntryTable::read(dir)?
        .iter()
        .filter(|entry| !entry.name.is_empty() && entry.kind == NodeKind::Dir)
        .map(|entry| entry.name.clone())
        .collect();
    access.close()?;

    for name in children {
        let child = dir.join(&name);
        if layout::is_working_copy(&child) {
            cleanup(&child, cancel)?;
        }
    }
    tracing::debug!(dir = %dir.display(), "cleanup complete");
    Ok(())
}

/// Removes stale temp droppings directly under the scratch directory.
/// The staged-base subdirectories stay: their contents are write-ahead
/// state the log pass may still consume.
fn clear_scratch(access: &AdmAccess) -> LogResult<()> {
    let tmp = access.tmp_dir();
    let reader = match fs::read_dir(&tmp) {
        Ok(reader) => reader,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(LogError::io("list scratch directory", tmp, error)),
    };
    for entry in reader {
        let entry = entry.map_err(|error| LogError::io("list scratch directory", tmp.clone(), error))?;
        let path = entry.path();
        if path.is_file() {
            fs::remove_file(&path)
                .map_err(|error| LogError::io("remove scratch file", path, error))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accum::LogAccumulator;
    use entries::Entry;

    fn versioned_dir(dir: &Path, revision: u64) {
        layout::create_adm_area(dir).unwrap();
        let mut table = EntryTable::new();
        let mut this_dir = Entry::named("");
        this_dir.kind = NodeKind::Dir;
        this_dir.revision = Some(revision);
        table.insert(this_dir);
        table.write(dir).unwrap();
    }

    #[test]
    fn stale_segments_are_replayed_and_consumed() {
        let temp = tempfile::tempdir().unwrap();
        versioned_dir(temp.path(), 1);
        fs::write(temp.path().join("stale"), b"x").unwrap();
        {
            let access = AdmAccess::open(temp.path()).unwrap();
            let mut log = LogAccumulator::new();
            log.rm("stale");
            log.save(&access).unwrap();
        }

        cleanup(temp.path(), None).unwrap();
        assert!(!temp.path().join("stale").exists());
        assert!(!layout::adm_path(temp.path(), &[layout::ADM_LOG]).exists());
        // The advisory lock was released on the way out.
        AdmAccess::open(temp.path()).unwrap();
    }

    #[test]
    fn recurses_into_child_directories() {
        let temp = tempfile::tempdir().unwrap();
        versioned_dir(temp.path(), 1);
        let mut table = EntryTable::read(temp.path()).unwrap();
        let mut child_entry = Entry::named("sub");
        child_entry.kind = NodeKind::Dir;
        child_entry.revision = Some(1);
        table.insert(child_entry);
        table.write(temp.path()).unwrap();

        let child = temp.path().join("sub");
        fs::create_dir(&child).unwrap();
        versioned_dir(&child, 1);
        fs::write(child.join("stale"), b"x").unwrap();
        {
            let access = AdmAccess::open(&child).unwrap();
            let mut log = LogAccumulator::new();
            log.rm("stale");
            log.save(&access).unwrap();
        }

        cleanup(temp.path(), None).unwrap();
        assert!(!child.join("stale").exists());
    }

    #[test]
    fn breaks_a_stale_lock() {
        let temp = tempfile::tempdir().unwrap();
        versioned_dir(temp.path(), 1);
        // Simulate a crash that never released the lock.
        let holder = AdmAccess::open(temp.path()).unwrap();
        std::mem::forget(holder);

        cleanup(temp.path(), None).unwrap();
        AdmAccess::open(temp.path()).unwrap();
    }

    #[test]
    fn cancellation_short_circuits() {
        let temp = tempfile::tempdir().unwrap();
        versioned_dir(temp.path(), 1);
        let probe = || true;
        let error = cleanup(temp.path(), Some(&probe)).unwrap_err();
        assert!(error.to_string().contains("cancelled"));
    }

    #[test]
    fn scratch_files_are_cleared_but_staged_bases_survive() {
        let temp = tempfile::tempdir().unwrap();
        versioned_dir(temp.path(), 1);
        let tmp = layout::adm_path(temp.path(), &[layout::ADM_TMP]);
        fs::write(tmp.join("dropping.tmp"), b"junk").unwrap();
        let staged = layout::tmp_text_base_path(temp.path(), "iota");
        fs::write(&staged, b"staged").unwrap();

        cleanup(temp.path(), None).unwrap();
        assert!(!tmp.join("dropping.tmp").exists());
        assert!(staged.exists());
    }
}
