//! The log runner: replays persisted segments against the directory.
//!
//! # Design
//!
//! Segments execute in ascending order, each segment's instructions in
//! sequence. Entry-table and cached-property mutations accumulate in
//! memory and flush at most once at the end of the pass; only then are
//! the consumed segment files deleted, newest first. A crash anywhere
//! leaves either the old state plus intact segments, or the new state
//! plus segments that rerun harmlessly.
//!
//! # Invariants
//!
//! - Normal execution treats a missing instruction target as corruption;
//!   a rerun treats it as already-done and moves on.
//! - A dropped destruction sentinel ends the pass: remaining
//!   instructions never run, and the sentinel handler takes over after
//!   the entry flush.
//! - Segment text is untrusted: non-relative paths are rejected, never
//!   resolved.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use adm::{AdmAccess, fsutil, layout};
use entries::props::{
    self, PROP_EOL_STYLE, PROP_EXECUTABLE, PROP_KEYWORDS, PROP_NEEDS_LOCK, PROP_SPECIAL,
    WcPropStore,
};
use entries::{Entry, EntryTable, FieldMask, NodeKind, THIS_DIR, Timestamp, timeformat};
use translate::{EolStyle, Keywords, special};

use crate::committed;
use crate::error::{LogError, LogResult};
use crate::instruction::{CopyMode, LogInstruction};
use crate::killme;
use crate::merge;
use crate::remove;

/// Shared state of one runner pass.
pub(crate) struct RunContext<'a> {
    pub(crate) access: &'a AdmAccess,
    pub(crate) rerun: bool,
    pub(crate) entries: Option<EntryTable>,
    pub(crate) wcprops: Option<WcPropStore>,
    pub(crate) entries_modified: bool,
    pub(crate) wcprops_modified: bool,
    pub(crate) killme_dropped: bool,
}

impl<'a> RunContext<'a> {
    fn new(access: &'a AdmAccess, rerun: bool) -> Self {
        Self {
            access,
            rerun,
            entries: None,
            wcprops: None,
            entries_modified: false,
            wcprops_modified: false,
            killme_dropped: false,
        }
    }

    /// The entry table, loaded on first use.
    pub(crate) fn entries(&mut self) -> LogResult<&mut EntryTable> {
        if self.entries.is_none() {
            self.entries = Some(EntryTable::read(self.access.dir())?);
        }
        Ok(self.entries.get_or_insert_with(EntryTable::new))
    }

    /// The cached-property store, loaded on first use.
    pub(crate) fn wcprops(&mut self) -> LogResult<&mut WcPropStore> {
        if self.wcprops.is_none() {
            self.wcprops = Some(WcPropStore::read(self.access.dir())?);
        }
        Ok(self.wcprops.get_or_insert_with(WcPropStore::default))
    }

    /// Writes back whatever was modified, each store at most once.
    fn flush(&mut self) -> LogResult<()> {
        if self.entries_modified
            && let Some(table) = &self.entries
        {
            table.write(self.access.dir())?;
            self.entries_modified = false;
        }
        if self.wcprops_modified
            && let Some(store) = &self.wcprops
        {
            store.write(self.access.dir())?;
            self.wcprops_modified = false;
        }
        Ok(())
    }
}

/// Validates a directory-relative instruction path and resolves it.
pub(crate) fn resolve(dir: &Path, relative: &str) -> LogResult<PathBuf> {
    let ok = Path::new(relative)
        .components()
        .all(|part| matches!(part, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(dir.join(relative))
    } else {
        Err(LogError::invalid_path(relative))
    }
}

/// Executes every pending log segment of `access`.
///
/// The first failure aborts the pass with segment files left in place;
/// the caller's recovery path is [`rerun_log`].
pub fn run_log(access: &AdmAccess) -> LogResult<()> {
    run(access, false)
}

/// Re-executes pending segments after an interrupted [`run_log`].
///
/// Identical to a normal pass except that instructions tolerate
/// already-done states: missing move sources, missing removal targets,
/// already-bumped entries.
pub fn rerun_log(access: &AdmAccess) -> LogResult<()> {
    run(access, true)
}

fn run(access: &AdmAccess, rerun: bool) -> LogResult<()> {
    let dir = access.dir().to_path_buf();
    if killme::killme_present(&dir) {
        return killme::run_killme(&dir);
    }

    let mut ctx = RunContext::new(access, rerun);
    let mut consumed = Vec::new();
    let mut segment = 0usize;
    'segments: loop {
        let path = access.adm_path(&[&layout::log_segment_name(segment)]);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => break,
            Err(error) => return Err(LogError::io("read log segment", path, error)),
        };
        let elements = adm::codec::parse_all(&text)
            .map_err(|error| failure(&dir, segment, 0, &error.to_string()))?;
        for (index, element) in elements.iter().enumerate() {
            let instruction = LogInstruction::from_element(element)
                .map_err(|error| failure(&dir, segment, index, &error.to_string()))?;
            execute(&mut ctx, &instruction)
                .map_err(|error| failure(&dir, segment, index, &error.to_string()))?;
            if ctx.killme_dropped {
                consumed.push(path.clone());
                break 'segments;
            }
        }
        consumed.push(path);
        segment += 1;
    }

    ctx.flush()?;

    if ctx.killme_dropped || killme::killme_present(&dir) {
        return killme::run_killme(&dir);
    }

    // Newest first, so a crash mid-deletion still leaves a contiguous
    // prefix for the rerun.
    for path in consumed.iter().rev() {
        fsutil::remove_file_if_present(path)
            .map_err(|error| LogError::io("remove log segment", path.clone(), error))?;
    }
    tracing::debug!(dir = %dir.display(), segments = consumed.len(), rerun, "log pass complete");
    Ok(())
}

fn failure(dir: &Path, segment: usize, index: usize, detail: &str) -> LogError {
    if segment == 0 && index == 0 {
        LogError::bad_log_start(dir.to_path_buf(), detail.to_owned())
    } else {
        LogError::bad_log(dir.to_path_buf(), segment, index, detail.to_owned())
    }
}

/// Tolerates absence during a rerun; otherwise reports corruption.
fn tolerate_missing(ctx: &RunContext<'_>, path: &Path) -> LogResult<()> {
    if ctx.rerun {
        Ok(())
    } else {
        Err(LogError::missing_target(path.to_path_buf()))
    }
}

pub(crate) fn execute(ctx: &mut RunContext<'_>, instruction: &LogInstruction) -> LogResult<()> {
    let dir = ctx.access.dir().to_path_buf();
    match instruction {
        LogInstruction::ModifyEntry { name, values, mask } => {
            modify_entry(ctx, &dir, name, values, *mask)
        }
        LogInstruction::DeleteLockFields { name } => {
            if let Some(entry) = ctx.entries()?.get_mut(name) {
                entry.lock_token = None;
                entry.lock_owner = None;
                entry.lock_comment = None;
                entry.lock_creation_date = None;
                ctx.entries_modified = true;
            }
            Ok(())
        }
        LogInstruction::DeleteEntry { name } => delete_entry(ctx, &dir, name),
        LogInstruction::Move { src, dst } => {
            let src_path = resolve(&dir, src)?;
            let dst_path = resolve(&dir, dst)?;
            let renamed = fsutil::rename_if_present(&src_path, &dst_path)
                .map_err(|error| LogError::io("move file", src_path.clone(), error))?;
            if renamed {
                Ok(())
            } else {
                tolerate_missing(ctx, &src_path)
            }
        }
        LogInstruction::Copy {
            src,
            dst,
            mode,
            style_source,
            special_only,
        } => copy(ctx, &dir, src, dst, *mode, style_source.as_deref(), *special_only),
        LogInstruction::Append { src, dst } => append(ctx, &dir, src, dst),
        LogInstruction::Remove { name } => {
            let path = resolve(&dir, name)?;
            fsutil::remove_file_if_present(&path)
                .map(|_| ())
                .map_err(|error| LogError::io("remove file", path, error))
        }
        LogInstruction::SetReadOnly { name } => {
            let path = resolve(&dir, name)?;
            match fsutil::set_read_only(&path, true) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    tolerate_missing(ctx, &path)
                }
                Err(error) => Err(LogError::io("set read-only bit", path, error)),
            }
        }
        LogInstruction::MaybeSetReadOnly { name } => maybe_read_only(ctx, &dir, name),
        LogInstruction::MaybeSetExecutable { name } => {
            let path = resolve(&dir, name)?;
            let file_props = props::read_prop_file(&layout::working_props_path(&dir, name))?;
            if file_props.contains_key(PROP_EXECUTABLE) && path.exists() {
                fsutil::set_executable(&path, true)
                    .map_err(|error| LogError::io("set executable bit", path, error))?;
            }
            Ok(())
        }
        LogInstruction::SetTimestamp { name, timestamp } => set_timestamp(ctx, &dir, name, timestamp),
        LogInstruction::Committed { name, revision } => committed::run(ctx, name, *revision),
        LogInstruction::ModifyWcProp {
            name,
            propname,
            propval,
        } => {
            let store = ctx.wcprops()?;
            match propval {
                Some(value) => store.set(name, propname, value),
                None => store.remove(name, propname),
            }
            ctx.wcprops_modified = true;
            Ok(())
        }
        LogInstruction::Merge {
            name,
            left,
            right,
            left_label,
            right_label,
            target_label,
        } => merge::run(
            ctx,
            name,
            left,
            right,
            (
                left_label.as_deref(),
                right_label.as_deref(),
                target_label.as_deref(),
            ),
        ),
        LogInstruction::UpgradeFormat { format } => {
            layout::write_format(&dir, *format)?;
            Ok(())
        }
    }
}

fn modify_entry(
    ctx: &mut RunContext<'_>,
    dir: &Path,
    name: &str,
    values: &Entry,
    mut mask: FieldMask,
) -> LogResult<()> {
    let mut values = values.clone();

    // The `working` sentinel resolves against the file as it exists now.
    if mask.contains(FieldMask::TEXT_TIME)
        && values.text_time == Some(Timestamp::UseCurrentFileTime)
    {
        let path = resolve(dir, name)?;
        match fsutil::file_mtime(&path) {
            Ok(mtime) => {
                values.text_time = Some(Timestamp::Literal(timeformat::to_iso8601(mtime)));
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tolerate_missing(ctx, &path)?;
                mask = mask.without(FieldMask::TEXT_TIME);
            }
            Err(error) => return Err(LogError::io("stat working file", path, error)),
        }
    }
    if mask.contains(FieldMask::PROP_TIME)
        && values.prop_time == Some(Timestamp::UseCurrentFileTime)
    {
        let path = layout::working_props_path(dir, name);
        match fsutil::file_mtime(&path) {
            Ok(mtime) => {
                values.prop_time = Some(Timestamp::Literal(timeformat::to_iso8601(mtime)));
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                mask = mask.without(FieldMask::PROP_TIME);
            }
            Err(error) => return Err(LogError::io("stat property file", path, error)),
        }
    }

    ctx.entries()?.entry_or_default(name).apply(&values, mask);
    ctx.entries_modified = true;
    Ok(())
}

fn delete_entry(ctx: &mut RunContext<'_>, dir: &Path, name: &str) -> LogResult<()> {
    let Some(entry) = ctx.entries()?.get(name).cloned() else {
        return Ok(());
    };
    if entry.kind == NodeKind::Dir && name != THIS_DIR {
        let child = resolve(dir, name)?;
        if layout::is_working_copy(&child) {
            remove::dir_from_revision_control(&child)?;
        }
    } else {
        remove::file_from_revision_control(dir, name, true)?;
    }
    ctx.entries()?.remove(name);
    ctx.entries_modified = true;
    ctx.wcprops()?.remove_target(name);
    ctx.wcprops_modified = true;
    Ok(())
}

fn copy(
    ctx: &mut RunContext<'_>,
    dir: &Path,
    src: &str,
    dst: &str,
    mode: CopyMode,
    style_source: Option<&str>,
    special_only: bool,
) -> LogResult<()> {
    let src_path = resolve(dir, src)?;
    let dst_path = resolve(dir, dst)?;
    if fs::symlink_metadata(&src_path).is_err() {
        return tolerate_missing(ctx, &src_path);
    }

    match mode {
        CopyMode::Plain => {
            fs::copy(&src_path, &dst_path)
                .map_err(|error| LogError::io("copy file", dst_path, error))?;
            Ok(())
        }
        CopyMode::Translate => {
            let style = style_source.unwrap_or(dst);
            let file_props = props::read_prop_file(&layout::working_props_path(dir, style))?;
            if file_props.contains_key(PROP_SPECIAL) {
                special::create_special_from_repr(&src_path, &dst_path)?;
                return Ok(());
            }
            if special_only {
                fs::copy(&src_path, &dst_path)
                    .map_err(|error| LogError::io("copy file", dst_path, error))?;
                return Ok(());
            }
            let eol = EolStyle::from_value(file_props.get(PROP_EOL_STYLE).map(String::as_str));
            let keywords = style_keywords(ctx, style, &file_props)?;
            translate::translate_file(&src_path, &dst_path, eol, &keywords, true)?;
            Ok(())
        }
        CopyMode::Detranslate => {
            let style = style_source.unwrap_or(src);
            let file_props = props::read_prop_file(&layout::working_props_path(dir, style))?;
            if file_props.contains_key(PROP_SPECIAL) || special::is_special(&src_path) {
                let repr = special::detranslate_special(&src_path)?;
                fsutil::write_atomic(&dst_path, &repr)
                    .map_err(|error| LogError::io("write special representation", dst_path, error))?;
                return Ok(());
            }
            let eol = if file_props.contains_key(PROP_EOL_STYLE) {
                EolStyle::Lf
            } else {
                EolStyle::None
            };
            let keywords = style_keywords(ctx, style, &file_props)?;
            translate::translate_file(&src_path, &dst_path, eol, &keywords, false)?;
            Ok(())
        }
    }
}

/// Builds the keyword table governing a translation from the style
/// source's entry metadata.
pub(crate) fn style_keywords(
    ctx: &mut RunContext<'_>,
    style: &str,
    file_props: &props::PropertyList,
) -> LogResult<Keywords> {
    let Some(list) = file_props.get(PROP_KEYWORDS) else {
        return Ok(Keywords::default());
    };
    let entry = ctx.entries()?.get(style).cloned().unwrap_or_default();
    let base = Path::new(style)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Keywords::from_property(
        list,
        &base,
        entry.committed_rev,
        entry.url.as_deref(),
        entry.committed_date.as_deref(),
        entry.committed_author.as_deref(),
    ))
}

fn append(ctx: &mut RunContext<'_>, dir: &Path, src: &str, dst: &str) -> LogResult<()> {
    use std::io::Write;

    let src_path = resolve(dir, src)?;
    let dst_path = resolve(dir, dst)?;
    let contents = match fs::read(&src_path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return tolerate_missing(ctx, &src_path);
        }
        Err(error) => return Err(LogError::io("read append source", src_path, error)),
    };
    let mut file = fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&dst_path)
        .map_err(|error| LogError::io("open append target", dst_path.clone(), error))?;
    file.write_all(&contents)
        .map_err(|error| LogError::io("append to file", dst_path, error))
}

fn maybe_read_only(ctx: &mut RunContext<'_>, dir: &Path, name: &str) -> LogResult<()> {
    let path = resolve(dir, name)?;
    let file_props = props::read_prop_file(&layout::working_props_path(dir, name))?;
    if !file_props.contains_key(PROP_NEEDS_LOCK) {
        return Ok(());
    }
    let locked = ctx
        .entries()?
        .get(name)
        .is_some_and(|entry| entry.lock_token.is_some());
    if locked {
        return Ok(());
    }
    match fsutil::set_read_only(&path, true) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(LogError::io("set read-only bit", path, error)),
    }
}

fn set_timestamp(
    ctx: &mut RunContext<'_>,
    dir: &Path,
    name: &str,
    timestamp: &Timestamp,
) -> LogResult<()> {
    let path = resolve(dir, name)?;
    let Timestamp::Literal(value) = timestamp else {
        // The sentinel asks for the file's own mtime; stamping a file
        // with its own mtime is a no-op.
        return Ok(());
    };
    if special::is_special(&path) {
        return Ok(());
    }
    let Some(mtime) = timeformat::from_iso8601(value) else {
        return Err(LogError::invalid_attribute(
            crate::instruction::tag::SET_TIMESTAMP,
            crate::instruction::attr::TIMESTAMP,
            value,
        ));
    };
    match fsutil::set_file_mtime(&path, mtime) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => tolerate_missing(ctx, &path),
        Err(error) => Err(LogError::io("stamp file mtime", path, error)),
    }
}
