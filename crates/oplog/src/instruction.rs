//! The log-instruction vocabulary and its element encoding.
//!
//! Every pending mutation is one self-closing element in a log segment.
//! The tag names and attribute vocabulary are part of the on-disk format;
//! existing working copies must replay under exactly this table:
//!
//! ```text
//! <mv name="tmp/iota" dest="iota"/>
//! <modify-entry name="iota" revision="42" schedule=""/>
//! <committed name="iota" revision="42"/>
//! ```
//!
//! Paths in instructions are always relative to the directory owning the
//! log; the generic `arg1`..`arg5` attributes carry per-instruction
//! extras (merge inputs and labels, copy style sources).

use entries::entry::attr as entry_attr;
use entries::{Entry, FieldMask, Timestamp};

use adm::Element;

use crate::error::{LogError, LogResult};

/// Instruction tag names.
pub mod tag {
    /// Masked entry update.
    pub const MODIFY_ENTRY: &str = "modify-entry";
    /// Clear the four lock fields of an entry.
    pub const DELETE_LOCK: &str = "delete-lock";
    /// Remove an entry from revision control.
    pub const DELETE_ENTRY: &str = "delete-entry";
    /// Rename a file.
    pub const MV: &str = "mv";
    /// Copy a file verbatim.
    pub const CP: &str = "cp";
    /// Copy while expanding keywords and applying EOL style.
    pub const CP_AND_TRANSLATE: &str = "cp-and-translate";
    /// Copy while contracting back to repository-normal form.
    pub const CP_AND_DETRANSLATE: &str = "cp-and-detranslate";
    /// Append one file's contents to another.
    pub const APPEND: &str = "append";
    /// Remove a file, tolerating absence.
    pub const RM: &str = "rm";
    /// Make a file read-only.
    pub const READONLY: &str = "readonly";
    /// Make a file read-only when `svn:needs-lock` applies and no lock
    /// is held.
    pub const MAYBE_READONLY: &str = "maybe-readonly";
    /// Make a file executable when `svn:executable` applies.
    pub const MAYBE_EXECUTABLE: &str = "maybe-executable";
    /// Stamp a file's mtime.
    pub const SET_TIMESTAMP: &str = "set-timestamp";
    /// Post-commit finalization of one target.
    pub const COMMITTED: &str = "committed";
    /// Cached-property update.
    pub const MODIFY_WCPROP: &str = "modify-wcprop";
    /// Three-way text merge into a working file.
    pub const MERGE: &str = "merge";
    /// Bump the administrative format marker.
    pub const UPGRADE_FORMAT: &str = "upgrade-format";
}

/// Instruction attribute names beyond the entry-field vocabulary.
pub mod attr {
    /// Primary target, relative to the directory.
    pub const NAME: &str = "name";
    /// Secondary target of move/copy/append.
    pub const DEST: &str = "dest";
    /// Timestamp value or the `working` sentinel.
    pub const TIMESTAMP: &str = "timestamp";
    /// Committed revision.
    pub const REVISION: &str = "revision";
    /// Cached-property name.
    pub const PROPNAME: &str = "propname";
    /// Cached-property value; absence means removal.
    pub const PROPVAL: &str = "propval";
    /// Format version for upgrades.
    pub const FORMAT: &str = "format";
    /// First generic argument.
    pub const ARG1: &str = "arg1";
    /// Second generic argument.
    pub const ARG2: &str = "arg2";
    /// Third generic argument.
    pub const ARG3: &str = "arg3";
    /// Fourth generic argument.
    pub const ARG4: &str = "arg4";
    /// Fifth generic argument.
    pub const ARG5: &str = "arg5";
}

/// Translation behavior of a copy instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyMode {
    /// Byte-for-byte copy.
    Plain,
    /// Expand keywords and apply EOL style toward working form.
    Translate,
    /// Contract keywords and normalize endings toward repository form.
    Detranslate,
}

/// One decoded log instruction.
///
/// Paths are directory-relative; validation against absolute or escaping
/// paths happens in the runner, which treats segment text as untrusted.
#[derive(Clone, Debug, PartialEq)]
pub enum LogInstruction {
    /// Merge the masked fields of `values` into the named entry.
    ModifyEntry {
        /// Target entry name.
        name: String,
        /// Field values to merge.
        values: Box<Entry>,
        /// Which fields of `values` apply.
        mask: FieldMask,
    },
    /// Clear the lock token, owner, comment, and creation date of the
    /// named entry.
    DeleteLockFields {
        /// Target entry name.
        name: String,
    },
    /// Remove the named target from revision control entirely.
    DeleteEntry {
        /// Target entry name.
        name: String,
    },
    /// Rename `src` to `dst`.
    Move {
        /// Source path.
        src: String,
        /// Destination path.
        dst: String,
    },
    /// Copy `src` to `dst`, possibly translating.
    Copy {
        /// Source path.
        src: String,
        /// Destination path.
        dst: String,
        /// Translation behavior.
        mode: CopyMode,
        /// Path whose entry and properties govern translation; defaults
        /// to the destination (translate) or source (detranslate).
        style_source: Option<String>,
        /// Only handle specialness; plain-copy regular files.
        special_only: bool,
    },
    /// Append the contents of `src` to `dst`.
    Append {
        /// Source path.
        src: String,
        /// Destination path.
        dst: String,
    },
    /// Remove the named file, tolerating absence.
    Remove {
        /// Target path.
        name: String,
    },
    /// Set the read-only bit unconditionally.
    SetReadOnly {
        /// Target path.
        name: String,
    },
    /// Set the read-only bit when `svn:needs-lock` is present and no
    /// lock token is recorded.
    MaybeSetReadOnly {
        /// Target path.
        name: String,
    },
    /// Set the executable bit when `svn:executable` is present.
    MaybeSetExecutable {
        /// Target path.
        name: String,
    },
    /// Stamp the target's mtime.
    SetTimestamp {
        /// Target path.
        name: String,
        /// The instant, or the execution-time sentinel.
        timestamp: Timestamp,
    },
    /// Finalize the named target after a commit of `revision`.
    Committed {
        /// Target entry name; empty for the directory itself.
        name: String,
        /// The new committed revision.
        revision: u64,
    },
    /// Set or remove one cached property of the named target.
    ModifyWcProp {
        /// Target entry name.
        name: String,
        /// Cached-property name.
        propname: String,
        /// New value; `None` removes the property.
        propval: Option<String>,
    },
    /// Three-way merge of `left`..`right` into the named working file.
    Merge {
        /// Target working file.
        name: String,
        /// Left (older) input path.
        left: String,
        /// Right (newer) input path.
        right: String,
        /// Conflict label for the left input.
        left_label: Option<String>,
        /// Conflict label for the right input.
        right_label: Option<String>,
        /// Conflict label for the working version.
        target_label: Option<String>,
    },
    /// Rewrite the administrative format marker.
    UpgradeFormat {
        /// New format version.
        format: u32,
    },
}

impl LogInstruction {
    /// Encodes the instruction as a log element.
    #[must_use]
    pub fn to_element(&self) -> Element {
        match self {
            Self::ModifyEntry { name, values, mask } => {
                let mut element = Element::new(tag::MODIFY_ENTRY).with_attr(attr::NAME, name);
                values.write_masked_attrs(&mut element, *mask);
                element
            }
            Self::DeleteLockFields { name } => {
                Element::new(tag::DELETE_LOCK).with_attr(attr::NAME, name)
            }
            Self::DeleteEntry { name } => {
                Element::new(tag::DELETE_ENTRY).with_attr(attr::NAME, name)
            }
            Self::Move { src, dst } => Element::new(tag::MV)
                .with_attr(attr::NAME, src)
                .with_attr(attr::DEST, dst),
            Self::Copy {
                src,
                dst,
                mode,
                style_source,
                special_only,
            } => {
                let tag = match mode {
                    CopyMode::Plain => tag::CP,
                    CopyMode::Translate => tag::CP_AND_TRANSLATE,
                    CopyMode::Detranslate => tag::CP_AND_DETRANSLATE,
                };
                let mut element = Element::new(tag)
                    .with_attr(attr::NAME, src)
                    .with_attr(attr::DEST, dst);
                if let Some(style) = style_source {
                    element.set_attr(attr::ARG2, style);
                }
                if *special_only {
                    element.set_attr(attr::ARG3, "true");
                }
                element
            }
            Self::Append { src, dst } => Element::new(tag::APPEND)
                .with_attr(attr::NAME, src)
                .with_attr(attr::DEST, dst),
            Self::Remove { name } => Element::new(tag::RM).with_attr(attr::NAME, name),
            Self::SetReadOnly { name } => {
                Element::new(tag::READONLY).with_attr(attr::NAME, name)
            }
            Self::MaybeSetReadOnly { name } => {
                Element::new(tag::MAYBE_READONLY).with_attr(attr::NAME, name)
            }
            Self::MaybeSetExecutable { name } => {
                Element::new(tag::MAYBE_EXECUTABLE).with_attr(attr::NAME, name)
            }
            Self::SetTimestamp { name, timestamp } => Element::new(tag::SET_TIMESTAMP)
                .with_attr(attr::NAME, name)
                .with_attr(attr::TIMESTAMP, timestamp.as_wire()),
            Self::Committed { name, revision } => Element::new(tag::COMMITTED)
                .with_attr(attr::NAME, name)
                .with_attr(attr::REVISION, revision.to_string()),
            Self::ModifyWcProp {
                name,
                propname,
                propval,
            } => {
                let mut element = Element::new(tag::MODIFY_WCPROP)
                    .with_attr(attr::NAME, name)
                    .with_attr(attr::PROPNAME, propname);
                if let Some(value) = propval {
                    element.set_attr(attr::PROPVAL, value);
                }
                element
            }
            Self::Merge {
                name,
                left,
                right,
                left_label,
                right_label,
                target_label,
            } => {
                let mut element = Element::new(tag::MERGE)
                    .with_attr(attr::NAME, name)
                    .with_attr(attr::ARG1, left)
                    .with_attr(attr::ARG2, right);
                if let Some(label) = left_label {
                    element.set_attr(attr::ARG3, label);
                }
                if let Some(label) = right_label {
                    element.set_attr(attr::ARG4, label);
                }
                if let Some(label) = target_label {
                    element.set_attr(attr::ARG5, label);
                }
                element
            }
            Self::UpgradeFormat { format } => {
                Element::new(tag::UPGRADE_FORMAT).with_attr(attr::FORMAT, format.to_string())
            }
        }
    }

    /// Decodes one log element.
    pub fn from_element(element: &Element) -> LogResult<Self> {
        match element.tag() {
            tag::MODIFY_ENTRY => {
                let name = required(element, tag::MODIFY_ENTRY, entry_attr::NAME)?;
                let (values, mask) =
                    Entry::from_element(element, std::path::Path::new(adm::layout::ADM_LOG))?;
                Ok(Self::ModifyEntry {
                    name,
                    values: Box::new(values),
                    mask,
                })
            }
            tag::DELETE_LOCK => Ok(Self::DeleteLockFields {
                name: required(element, tag::DELETE_LOCK, attr::NAME)?,
            }),
            tag::DELETE_ENTRY => Ok(Self::DeleteEntry {
                name: required(element, tag::DELETE_ENTRY, attr::NAME)?,
            }),
            tag::MV => Ok(Self::Move {
                src: required(element, tag::MV, attr::NAME)?,
                dst: required(element, tag::MV, attr::DEST)?,
            }),
            tag::CP => Ok(Self::Copy {
                src: required(element, tag::CP, attr::NAME)?,
                dst: required(element, tag::CP, attr::DEST)?,
                mode: CopyMode::Plain,
                style_source: None,
                special_only: false,
            }),
            tag::CP_AND_TRANSLATE => Ok(Self::Copy {
                src: required(element, tag::CP_AND_TRANSLATE, attr::NAME)?,
                dst: required(element, tag::CP_AND_TRANSLATE, attr::DEST)?,
                mode: CopyMode::Translate,
                style_source: element.attr(attr::ARG2).map(str::to_owned),
                special_only: element.attr(attr::ARG3).is_some(),
            }),
            tag::CP_AND_DETRANSLATE => Ok(Self::Copy {
                src: required(element, tag::CP_AND_DETRANSLATE, attr::NAME)?,
                dst: required(element, tag::CP_AND_DETRANSLATE, attr::DEST)?,
                mode: CopyMode::Detranslate,
                style_source: element.attr(attr::ARG2).map(str::to_owned),
                special_only: false,
            }),
            tag::APPEND => Ok(Self::Append {
                src: required(element, tag::APPEND, attr::NAME)?,
                dst: required(element, tag::APPEND, attr::DEST)?,
            }),
            tag::RM => Ok(Self::Remove {
                name: required(element, tag::RM, attr::NAME)?,
            }),
            tag::READONLY => Ok(Self::SetReadOnly {
                name: required(element, tag::READONLY, attr::NAME)?,
            }),
            tag::MAYBE_READONLY => Ok(Self::MaybeSetReadOnly {
                name: required(element, tag::MAYBE_READONLY, attr::NAME)?,
            }),
            tag::MAYBE_EXECUTABLE => Ok(Self::MaybeSetExecutable {
                name: required(element, tag::MAYBE_EXECUTABLE, attr::NAME)?,
            }),
            tag::SET_TIMESTAMP => Ok(Self::SetTimestamp {
                name: required(element, tag::SET_TIMESTAMP, attr::NAME)?,
                timestamp: Timestamp::from_wire(&required(
                    element,
                    tag::SET_TIMESTAMP,
                    attr::TIMESTAMP,
                )?),
            }),
            tag::COMMITTED => {
                let revision = required(element, tag::COMMITTED, attr::REVISION)?;
                let revision = revision.parse::<u64>().map_err(|_| {
                    LogError::invalid_attribute(tag::COMMITTED, attr::REVISION, &revision)
                })?;
                Ok(Self::Committed {
                    name: element.attr(attr::NAME).unwrap_or_default().to_owned(),
                    revision,
                })
            }
            tag::MODIFY_WCPROP => Ok(Self::ModifyWcProp {
                name: element.attr(attr::NAME).unwrap_or_default().to_owned(),
                propname: required(element, tag::MODIFY_WCPROP, attr::PROPNAME)?,
                propval: element.attr(attr::PROPVAL).map(str::to_owned),
            }),
            tag::MERGE => Ok(Self::Merge {
                name: required(element, tag::MERGE, attr::NAME)?,
                left: required(element, tag::MERGE, attr::ARG1)?,
                right: required(element, tag::MERGE, attr::ARG2)?,
                left_label: element.attr(attr::ARG3).map(str::to_owned),
                right_label: element.attr(attr::ARG4).map(str::to_owned),
                target_label: element.attr(attr::ARG5).map(str::to_owned),
            }),
            tag::UPGRADE_FORMAT => {
                let format = required(element, tag::UPGRADE_FORMAT, attr::FORMAT)?;
                let format = format.parse::<u32>().map_err(|_| {
                    LogError::invalid_attribute(tag::UPGRADE_FORMAT, attr::FORMAT, &format)
                })?;
                Ok(Self::UpgradeFormat { format })
            }
            other => Err(LogError::unknown_instruction(other)),
        }
    }
}

fn required(element: &Element, tag: &'static str, attr: &'static str) -> LogResult<String> {
    element
        .attr(attr)
        .map(str::to_owned)
        .ok_or_else(|| LogError::missing_attribute(tag, attr))
}
