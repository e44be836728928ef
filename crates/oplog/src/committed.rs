//! Post-commit finalization: the `committed` instruction.
//!
//! After the repository accepts a commit, each committed target needs its
//! local record brought up to date: staged pristine bases moved into
//! place, the schedule reset, the working revision bumped, conflict and
//! copy state cleared. Deletions finish differently: a committed file
//! delete scrubs the target (leaving a tombstone when the commit
//! outran the parent's recorded revision), and a committed delete of the
//! directory itself drops the destruction sentinel and ends the pass.
//!
//! Reruns are recognized by the target's record: schedule already normal
//! at the committed revision means everything below already happened.

use std::fs;
use std::io;
use std::path::Path;

use adm::error::AdmError;
use adm::{AdmAccess, fsutil, layout};
use entries::props::{self, PROP_EOL_STYLE, PROP_SPECIAL};
use entries::{Entry, EntryTable, NodeKind, Schedule, Timestamp, timeformat};
use translate::{EolStyle, special};

use crate::error::{LogError, LogResult};
use crate::killme;
use crate::remove;
use crate::runner::{self, RunContext};

pub(crate) fn run(ctx: &mut RunContext<'_>, name: &str, revision: u64) -> LogResult<()> {
    let dir = ctx.access.dir().to_path_buf();
    let Some(entry) = ctx.entries()?.get(name).cloned() else {
        return Ok(());
    };
    let is_this_dir = name.is_empty();

    if entry.schedule == Schedule::Delete {
        if is_this_dir {
            return finish_dir_deletion(ctx, revision);
        }
        return finish_file_deletion(ctx, &dir, name, &entry, revision);
    }

    if is_this_dir && entry.schedule == Schedule::Replace {
        sweep_replaced_children(ctx, &dir)?;
    }

    // Rerun guard: a normal-scheduled record already at the committed
    // revision has nothing left to finalize.
    if entry.schedule == Schedule::Normal && !entry.deleted && entry.revision == Some(revision) {
        return Ok(());
    }

    finalize(ctx, &dir, name, &entry, revision)?;
    if is_this_dir {
        propagate_to_parent(&dir, revision)?;
    }
    Ok(())
}

/// Committed deletion of the directory itself. The record keeps the new
/// revision (the destruction sentinel reads it back for the parent's
/// tombstone), then the sentinel drops and the pass ends.
fn finish_dir_deletion(ctx: &mut RunContext<'_>, revision: u64) -> LogResult<()> {
    if let Some(this_dir) = ctx.entries()?.this_dir_mut() {
        this_dir.revision = Some(revision);
    }
    ctx.entries_modified = true;
    killme::drop_killme(ctx.access)?;
    ctx.killme_dropped = true;
    tracing::debug!(revision, "directory deletion committed, sentinel dropped");
    Ok(())
}

/// Committed deletion of one file: scrub it, then decide between
/// forgetting the entry and keeping a tombstone.
fn finish_file_deletion(
    ctx: &mut RunContext<'_>,
    dir: &Path,
    name: &str,
    entry: &Entry,
    revision: u64,
) -> LogResult<()> {
    remove::file_from_revision_control(dir, name, true)?;
    let table = ctx.entries()?;
    table.remove(name);
    // The parent claims an older revision: without a tombstone a later
    // update would mistake the deletion for a missing file.
    let parent_revision = table.this_dir().and_then(|this_dir| this_dir.revision);
    if parent_revision.is_none_or(|recorded| revision > recorded) {
        let mut tombstone = Entry::named(name);
        tombstone.kind = entry.kind;
        tombstone.deleted = true;
        tombstone.revision = Some(revision);
        table.insert(tombstone);
    }
    ctx.entries_modified = true;
    ctx.wcprops()?.remove_target(name);
    ctx.wcprops_modified = true;
    Ok(())
}

/// A committed replacement of the directory: children still scheduled
/// for deletion were replaced away and leave revision control now.
fn sweep_replaced_children(ctx: &mut RunContext<'_>, dir: &Path) -> LogResult<()> {
    let doomed: Vec<String> = ctx
        .entries()?
        .iter()
        .filter(|entry| !entry.name.is_empty() && entry.schedule == Schedule::Delete)
        .map(|entry| entry.name.clone())
        .collect();
    for name in doomed {
        let kind = ctx.entries()?.get(&name).map(|entry| entry.kind);
        if kind == Some(NodeKind::Dir) {
            let child = dir.join(&name);
            if layout::is_working_copy(&child) {
                remove::dir_from_revision_control(&child)?;
            }
        } else {
            remove::file_from_revision_control(dir, &name, true)?;
        }
        ctx.entries()?.remove(&name);
        ctx.wcprops()?.remove_target(&name);
        ctx.wcprops_modified = true;
        ctx.entries_modified = true;
    }
    Ok(())
}

/// The ordinary finalization path, shared by files and the directory's
/// own record.
fn finalize(
    ctx: &mut RunContext<'_>,
    dir: &Path,
    name: &str,
    entry: &Entry,
    revision: u64,
) -> LogResult<()> {
    let is_file = entry.kind != NodeKind::Dir;

    let mut fresh_base = false;
    if is_file {
        fresh_base = install_staged(
            &layout::tmp_text_base_path(dir, name),
            &layout::text_base_path(dir, name),
        )?;
    }
    install_staged(
        &layout::tmp_prop_base_path(dir, name),
        &layout::prop_base_path(dir, name),
    )?;
    if fresh_base {
        retranslate_working_file(ctx, dir, name)?;
    }

    let working = dir.join(name);
    let text_time = if is_file && !special::is_special(&working) {
        match fsutil::file_mtime(&working) {
            Ok(mtime) => Some(Timestamp::Literal(timeformat::to_iso8601(mtime))),
            Err(error) if error.kind() == io::ErrorKind::NotFound => None,
            Err(error) => return Err(LogError::io("stat working file", working, error)),
        }
    } else {
        None
    };

    let record = ctx.entries()?.entry_or_default(name);
    record.revision = Some(revision);
    record.schedule = Schedule::Normal;
    record.copied = false;
    record.deleted = false;
    record.absent = false;
    record.copyfrom_url = None;
    record.copyfrom_rev = None;
    record.conflict_old = None;
    record.conflict_new = None;
    record.conflict_wrk = None;
    record.prejfile = None;
    if let Some(time) = text_time {
        record.text_time = Some(time);
    }
    ctx.entries_modified = true;
    tracing::debug!(name, revision, "commit finalized");
    Ok(())
}

/// Moves a write-ahead pristine base into its final location.
///
/// Absence of the staged file means either nothing was staged or a rerun
/// already installed it; both are fine. Returns whether an install
/// happened now.
fn install_staged(staged: &Path, dest: &Path) -> LogResult<bool> {
    let installed = fsutil::rename_if_present(staged, dest)
        .map_err(|error| LogError::io("install pristine base", dest.to_path_buf(), error))?;
    if installed {
        fsutil::set_read_only(dest, true)
            .map_err(|error| LogError::io("protect pristine base", dest.to_path_buf(), error))?;
    }
    Ok(installed)
}

/// A fresh pristine base carries the commit's keyword values; the
/// working file (whose detranslated text is that base) picks them up by
/// re-expansion.
fn retranslate_working_file(ctx: &mut RunContext<'_>, dir: &Path, name: &str) -> LogResult<()> {
    let file_props = props::read_prop_file(&layout::working_props_path(dir, name))?;
    if file_props.contains_key(PROP_SPECIAL) {
        return Ok(());
    }
    let eol = EolStyle::from_value(file_props.get(PROP_EOL_STYLE).map(String::as_str));
    let keywords = runner::style_keywords(ctx, name, &file_props)?;
    if eol == EolStyle::None && keywords.is_empty() {
        return Ok(());
    }

    let base = layout::text_base_path(dir, name);
    let working = dir.join(name);
    let staged = fsutil::unique_tmp_path(&layout::adm_path(dir, &[layout::ADM_TMP]), name);
    translate::translate_file(&base, &staged, eol, &keywords, true)?;
    // A needs-lock working file may be read-only; rename would fail on
    // some platforms with the target protected.
    match fsutil::set_read_only(&working, false) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fsutil::remove_file_if_present(&staged);
            return Err(LogError::io("unprotect working file", working, error));
        }
    }
    if let Err(error) = fs::rename(&staged, &working) {
        let _ = fsutil::remove_file_if_present(&staged);
        return Err(LogError::io("install retranslated file", working, error));
    }
    Ok(())
}

/// A committed directory bumps the revision its parent records for it.
///
/// When the commit outran the parent's own revision, the child entry is
/// additionally marked `deleted`: the parent's revision does not contain
/// this child at the new revision yet, and the marker keeps a later
/// update of the parent from mistaking the bump for corruption. Skipped
/// when the directory is a working-copy root, the parent is unversioned,
/// or the parent is locked by an enclosing operation; the parent then
/// catches up on its own next update.
fn propagate_to_parent(dir: &Path, revision: u64) -> LogResult<()> {
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
    if table.get(name).is_none() {
        // Disjoint nested working copy; the parent does not track us.
        parent_access.close()?;
        return Ok(());
    }
    let parent_revision = table
        .this_dir()
        .and_then(|entry| entry.revision)
        .unwrap_or(0);
    if let Some(record) = table.get_mut(name) {
        record.revision = Some(revision);
        record.schedule = Schedule::Normal;
        record.deleted = revision > parent_revision;
    }
    table.write(parent)?;
    parent_access.close()?;
    Ok(())
}
