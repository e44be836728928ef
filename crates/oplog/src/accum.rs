//! In-memory accumulation and durable persistence of log segments.
//!
//! Operations build their pending mutations in a [`LogAccumulator`], then
//! persist the whole batch with one atomic [`LogAccumulator::save`]. A
//! segment either exists completely or not at all; execution only ever
//! sees durable segments.

use adm::{AdmAccess, fsutil, layout};
use entries::{Entry, FieldMask, Timestamp};
use std::path::Path;

use crate::error::{LogError, LogResult};
use crate::instruction::{CopyMode, LogInstruction};

/// Ordered collection of not-yet-persisted log instructions.
///
/// Append methods take directory-relative paths; handing one an absolute
/// or escaping path is a caller bug and panics rather than producing a
/// segment that would run against foreign files.
#[derive(Clone, Debug, Default)]
pub struct LogAccumulator {
    instructions: Vec<LogInstruction>,
}

fn assert_loggable(path: &str) {
    use std::path::Component;
    assert!(
        Path::new(path)
            .components()
            .all(|part| matches!(part, Component::Normal(_) | Component::CurDir)),
        "log path '{path}' is not relative to the directory"
    );
}

impl LogAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Number of accumulated instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// The accumulated instructions, in append order.
    #[must_use]
    pub fn instructions(&self) -> &[LogInstruction] {
        &self.instructions
    }

    /// Appends a masked entry update. An empty mask accumulates nothing.
    pub fn modify_entry(&mut self, name: &str, values: Entry, mask: FieldMask) {
        assert_loggable(name);
        if mask.is_empty() {
            return;
        }
        self.instructions.push(LogInstruction::ModifyEntry {
            name: name.to_owned(),
            values: Box::new(values),
            mask,
        });
    }

    /// Appends a lock-field clear.
    pub fn delete_lock_fields(&mut self, name: &str) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::DeleteLockFields {
            name: name.to_owned(),
        });
    }

    /// Appends removal of the named target from revision control.
    pub fn delete_entry(&mut self, name: &str) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::DeleteEntry {
            name: name.to_owned(),
        });
    }

    /// Appends a rename.
    pub fn mv(&mut self, src: &str, dst: &str) {
        assert_loggable(src);
        assert_loggable(dst);
        self.instructions.push(LogInstruction::Move {
            src: src.to_owned(),
            dst: dst.to_owned(),
        });
    }

    /// Appends a byte-for-byte copy.
    pub fn cp(&mut self, src: &str, dst: &str) {
        self.push_copy(src, dst, CopyMode::Plain, None, false);
    }

    /// Appends a copy that expands keywords and applies EOL style.
    ///
    /// `style_source` names the path whose entry and properties govern
    /// the translation; `None` uses the destination.
    pub fn cp_and_translate(
        &mut self,
        src: &str,
        dst: &str,
        style_source: Option<&str>,
        special_only: bool,
    ) {
        self.push_copy(src, dst, CopyMode::Translate, style_source, special_only);
    }

    /// Appends a copy that contracts back to repository-normal form.
    pub fn cp_and_detranslate(&mut self, src: &str, dst: &str, style_source: Option<&str>) {
        self.push_copy(src, dst, CopyMode::Detranslate, style_source, false);
    }

    fn push_copy(
        &mut self,
        src: &str,
        dst: &str,
        mode: CopyMode,
        style_source: Option<&str>,
        special_only: bool,
    ) {
        assert_loggable(src);
        assert_loggable(dst);
        if let Some(style) = style_source {
            assert_loggable(style);
        }
        self.instructions.push(LogInstruction::Copy {
            src: src.to_owned(),
            dst: dst.to_owned(),
            mode,
            style_source: style_source.map(str::to_owned),
            special_only,
        });
    }

    /// Appends a file append.
    pub fn append(&mut self, src: &str, dst: &str) {
        assert_loggable(src);
        assert_loggable(dst);
        self.instructions.push(LogInstruction::Append {
            src: src.to_owned(),
            dst: dst.to_owned(),
        });
    }

    /// Appends a tolerant file removal.
    pub fn rm(&mut self, name: &str) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::Remove {
            name: name.to_owned(),
        });
    }

    /// Appends an unconditional read-only marking.
    pub fn set_read_only(&mut self, name: &str) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::SetReadOnly {
            name: name.to_owned(),
        });
    }

    /// Appends a conditional read-only marking (`svn:needs-lock` without
    /// a held lock).
    pub fn maybe_set_read_only(&mut self, name: &str) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::MaybeSetReadOnly {
            name: name.to_owned(),
        });
    }

    /// Appends a conditional executable marking (`svn:executable`).
    pub fn maybe_set_executable(&mut self, name: &str) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::MaybeSetExecutable {
            name: name.to_owned(),
        });
    }

    /// Appends an mtime stamp.
    pub fn set_timestamp(&mut self, name: &str, timestamp: Timestamp) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::SetTimestamp {
            name: name.to_owned(),
            timestamp,
        });
    }

    /// Appends post-commit finalization of one target.
    pub fn committed(&mut self, name: &str, revision: u64) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::Committed {
            name: name.to_owned(),
            revision,
        });
    }

    /// Appends a cached-property update; `None` removes the property.
    pub fn modify_wcprop(&mut self, name: &str, propname: &str, propval: Option<&str>) {
        assert_loggable(name);
        self.instructions.push(LogInstruction::ModifyWcProp {
            name: name.to_owned(),
            propname: propname.to_owned(),
            propval: propval.map(str::to_owned),
        });
    }

    /// Appends a three-way merge into `name`.
    pub fn merge(
        &mut self,
        name: &str,
        left: &str,
        right: &str,
        labels: (Option<&str>, Option<&str>, Option<&str>),
    ) {
        assert_loggable(name);
        assert_loggable(left);
        assert_loggable(right);
        let (left_label, right_label, target_label) = labels;
        self.instructions.push(LogInstruction::Merge {
            name: name.to_owned(),
            left: left.to_owned(),
            right: right.to_owned(),
            left_label: left_label.map(str::to_owned),
            right_label: right_label.map(str::to_owned),
            target_label: target_label.map(str::to_owned),
        });
    }

    /// Appends a format-marker upgrade.
    pub fn upgrade_format(&mut self, format: u32) {
        self.instructions
            .push(LogInstruction::UpgradeFormat { format });
    }

    /// Serializes the batch as segment text.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for instruction in &self.instructions {
            instruction.to_element().write_to(&mut out);
        }
        out
    }

    /// Persists the batch as the next free log segment of `access`.
    ///
    /// The write is atomic; readers and repliers either see the whole
    /// segment or none of it. Returns the segment number. An empty
    /// accumulator writes nothing and reports segment 0.
    pub fn save(&self, access: &AdmAccess) -> LogResult<usize> {
        if self.instructions.is_empty() {
            return Ok(0);
        }
        let mut number = 0usize;
        let path = loop {
            let candidate = access.adm_path(&[&layout::log_segment_name(number)]);
            if !candidate.exists() {
                break candidate;
            }
            number += 1;
        };
        fsutil::write_atomic(&path, self.serialize().as_bytes())
            .map_err(|error| LogError::io("write log segment", path, error))?;
        tracing::debug!(
            dir = %access.dir().display(),
            segment = number,
            instructions = self.instructions.len(),
            "log segment saved"
        );
        Ok(number)
    }
}

/// Persists `log` as segment number `segment` of `access`, replacing an
/// existing file of that number.
///
/// [`LogAccumulator::save`] is the usual entry point; this one exists
/// for drivers that manage segment numbering themselves.
pub fn write_log_segment(
    access: &AdmAccess,
    segment: usize,
    log: &LogAccumulator,
) -> LogResult<()> {
    let path = access.adm_path(&[&layout::log_segment_name(segment)]);
    fsutil::write_atomic(&path, log.serialize().as_bytes())
        .map_err(|error| LogError::io("write log segment", path, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_mask_accumulates_nothing() {
        let mut log = LogAccumulator::new();
        log.modify_entry("iota", Entry::named("iota"), FieldMask::empty());
        assert!(log.is_empty());
    }

    #[test]
    fn save_picks_the_next_free_segment() {
        let temp = tempfile::tempdir().unwrap();
        layout::create_adm_area(temp.path()).unwrap();
        let access = AdmAccess::open(temp.path()).unwrap();

        let mut log = LogAccumulator::new();
        log.rm("tmp/iota");
        assert_eq!(log.save(&access).unwrap(), 0);
        assert_eq!(log.save(&access).unwrap(), 1);

        assert!(access.adm_path(&["log"]).is_file());
        assert!(access.adm_path(&["log.1"]).is_file());
        assert!(!access.adm_path(&["log.2"]).exists());
    }

    #[test]
    fn empty_batch_writes_no_segment() {
        let temp = tempfile::tempdir().unwrap();
        layout::create_adm_area(temp.path()).unwrap();
        let access = AdmAccess::open(temp.path()).unwrap();
        LogAccumulator::new().save(&access).unwrap();
        assert!(!access.adm_path(&["log"]).exists());
    }

    #[test]
    fn serialized_segments_parse_back() {
        let mut log = LogAccumulator::new();
        log.mv("tmp/iota", "iota");
        log.committed("iota", 42);
        log.modify_wcprop("iota", "svn:wc:ra_dav:version-url", Some("/r/42/iota"));

        let text = log.serialize();
        let elements = adm::codec::parse_all(&text).unwrap();
        assert_eq!(elements.len(), 3);
        let decoded: Vec<_> = elements
            .iter()
            .map(|element| LogInstruction::from_element(element).unwrap())
            .collect();
        assert_eq!(decoded.as_slice(), log.instructions());
    }

    #[test]
    #[should_panic(expected = "not relative")]
    fn absolute_paths_are_a_caller_bug() {
        let mut log = LogAccumulator::new();
        log.rm("/etc/passwd");
    }

    #[test]
    #[should_panic(expected = "not relative")]
    fn escaping_paths_are_a_caller_bug() {
        let mut log = LogAccumulator::new();
        log.mv("../outside", "iota");
    }
}
