//! Removal of targets from revision control.
//!
//! Shared by the `delete-entry` instruction, post-commit deletion
//! handling, and the destruction sentinel. Directory destruction is
//! deliberately best-effort: unversioned obstructions keep their parent
//! directories alive, and destruction ignores advisory locks because the
//! administrative area (lock file included) is itself being removed.

use std::fs;
use std::path::Path;

use adm::{fsutil, layout};
use entries::{EntryTable, NodeKind};

use crate::error::{LogError, LogResult};

/// Scrubs every administrative trace of the file entry `name` in `dir`.
///
/// Removes the text base, committed and working property lists, and
/// (when `destroy_working_file` is set) the working file itself. The
/// caller owns the entry-table and cached-property mutations.
pub(crate) fn file_from_revision_control(
    dir: &Path,
    name: &str,
    destroy_working_file: bool,
) -> LogResult<()> {
    for path in [
        layout::text_base_path(dir, name),
        layout::tmp_text_base_path(dir, name),
        layout::prop_base_path(dir, name),
        layout::tmp_prop_base_path(dir, name),
        layout::working_props_path(dir, name),
    ] {
        fsutil::remove_file_if_present(&path)
            .map_err(|error| LogError::io("remove administrative file", path, error))?;
    }
    if destroy_working_file {
        let working = dir.join(name);
        fsutil::remove_file_if_present(&working)
            .map_err(|error| LogError::io("remove working file", working, error))?;
    }
    Ok(())
}

/// Recursively destroys the versioned contents of `dir`, its
/// administrative area included.
///
/// Versioned children go first: files are scrubbed, child working
/// copies recurse. The directory itself is removed only when nothing
/// unversioned remains inside it.
pub(crate) fn dir_from_revision_control(dir: &Path) -> LogResult<()> {
    let table = EntryTable::read(dir)?;
    for name in table.child_names() {
        let Some(entry) = table.get(&name) else {
            continue;
        };
        if entry.kind == NodeKind::Dir {
            let child = dir.join(&name);
            if layout::is_working_copy(&child) {
                dir_from_revision_control(&child)?;
            } else if child.is_dir() {
                fs::remove_dir_all(&child)
                    .map_err(|error| LogError::io("remove versioned directory", child, error))?;
            }
        } else {
            file_from_revision_control(dir, &name, true)?;
        }
    }

    let adm = layout::adm_dir(dir);
    if adm.is_dir() {
        fs::remove_dir_all(&adm)
            .map_err(|error| LogError::io("remove administrative area", adm, error))?;
    }
    // Unversioned leftovers keep the directory; that is not an error.
    let _ = fs::remove_dir(dir);
    Ok(())
}
