//! The versioned-resource record and its masked-update contract.

use adm::Element;

use crate::error::EntriesError;
use crate::fields::FieldMask;
use crate::types::{NodeKind, Schedule, Timestamp};

/// Entry-field attribute names.
///
/// One attribute per field; the table is part of the on-disk format and
/// interoperating tools must reproduce it exactly.
pub mod attr {
    /// Entry name (the empty string names the directory itself).
    pub const NAME: &str = "name";
    /// Working revision.
    pub const REVISION: &str = "revision";
    /// Repository URL of the entry.
    pub const URL: &str = "url";
    /// Repository root URL.
    pub const REPOS: &str = "repos";
    /// Repository UUID.
    pub const UUID: &str = "uuid";
    /// Node kind.
    pub const KIND: &str = "kind";
    /// Pending-change schedule.
    pub const SCHEDULE: &str = "schedule";
    /// Entry is the product of a copy.
    pub const COPIED: &str = "copied";
    /// Deleted in the revision the parent claims ("tombstone").
    pub const DELETED: &str = "deleted";
    /// Known to the repository but absent locally.
    pub const ABSENT: &str = "absent";
    /// Directory contents only partially recorded.
    pub const INCOMPLETE: &str = "incomplete";
    /// Copy source URL.
    pub const COPYFROM_URL: &str = "copyfrom-url";
    /// Copy source revision.
    pub const COPYFROM_REV: &str = "copyfrom-rev";
    /// Old-revision conflict file.
    pub const CONFLICT_OLD: &str = "conflict-old";
    /// New-revision conflict file.
    pub const CONFLICT_NEW: &str = "conflict-new";
    /// Working-version conflict file.
    pub const CONFLICT_WRK: &str = "conflict-wrk";
    /// Property-reject file.
    pub const PREJFILE: &str = "prejfile";
    /// Last-known working-file text timestamp.
    pub const TEXT_TIME: &str = "text-time";
    /// Last-known property timestamp.
    pub const PROP_TIME: &str = "prop-time";
    /// Text-base checksum.
    pub const CHECKSUM: &str = "checksum";
    /// Last-committed revision.
    pub const CMT_REV: &str = "committed-rev";
    /// Last-committed date.
    pub const CMT_DATE: &str = "committed-date";
    /// Last-committed author.
    pub const CMT_AUTHOR: &str = "committed-author";
    /// Repository lock token.
    pub const LOCK_TOKEN: &str = "lock-token";
    /// Repository lock owner.
    pub const LOCK_OWNER: &str = "lock-owner";
    /// Repository lock comment.
    pub const LOCK_COMMENT: &str = "lock-comment";
    /// Repository lock creation date.
    pub const LOCK_CREATION_DATE: &str = "lock-creation-date";
    /// Entry has committed properties.
    pub const HAS_PROPS: &str = "has-props";
    /// Entry has local property modifications.
    pub const HAS_PROP_MODS: &str = "has-prop-mods";
    /// Space-separated list of cachable property names.
    pub const CACHABLE_PROPS: &str = "cachable-props";
    /// Space-separated list of cachable properties actually present.
    pub const PRESENT_PROPS: &str = "present-props";
}

/// Wire value for boolean attributes; absence means false.
const WIRE_TRUE: &str = "true";

/// The metadata record for one versioned path within a directory.
///
/// Owned exclusively by the directory's [`EntryTable`](crate::EntryTable)
/// and mutated only through masked [`Entry::apply`] updates driven by the
/// operation log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entry {
    /// Entry name; empty for the directory's own record.
    pub name: String,
    /// Working revision.
    pub revision: Option<u64>,
    /// Repository URL.
    pub url: Option<String>,
    /// Repository root URL.
    pub repos: Option<String>,
    /// Repository UUID.
    pub uuid: Option<String>,
    /// Node kind.
    pub kind: NodeKind,
    /// Pending-change schedule.
    pub schedule: Schedule,
    /// Product of a copy.
    pub copied: bool,
    /// Tombstone: deleted in the parent's recorded revision.
    pub deleted: bool,
    /// Known remotely, absent locally.
    pub absent: bool,
    /// Directory contents only partially recorded.
    pub incomplete: bool,
    /// Copy source URL.
    pub copyfrom_url: Option<String>,
    /// Copy source revision.
    pub copyfrom_rev: Option<u64>,
    /// Old-revision conflict file reference.
    pub conflict_old: Option<String>,
    /// New-revision conflict file reference.
    pub conflict_new: Option<String>,
    /// Working-version conflict file reference.
    pub conflict_wrk: Option<String>,
    /// Property-reject file reference.
    pub prejfile: Option<String>,
    /// Working-file text timestamp.
    pub text_time: Option<Timestamp>,
    /// Property timestamp.
    pub prop_time: Option<Timestamp>,
    /// Text-base checksum.
    pub checksum: Option<String>,
    /// Last-committed revision.
    pub committed_rev: Option<u64>,
    /// Last-committed date.
    pub committed_date: Option<String>,
    /// Last-committed author.
    pub committed_author: Option<String>,
    /// Lock token.
    pub lock_token: Option<String>,
    /// Lock owner.
    pub lock_owner: Option<String>,
    /// Lock comment.
    pub lock_comment: Option<String>,
    /// Lock creation date.
    pub lock_creation_date: Option<String>,
    /// Entry has committed properties.
    pub has_props: bool,
    /// Entry has local property modifications.
    pub has_prop_mods: bool,
    /// Cachable property names.
    pub cachable_props: Option<String>,
    /// Cachable properties actually present.
    pub present_props: Option<String>,
}

impl Entry {
    /// Creates an empty record named `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Merges the fields of `values` selected by `mask` into `self`.
    ///
    /// Every field outside the mask is left byte-for-byte untouched; this
    /// is the record's update contract.
    pub fn apply(&mut self, values: &Entry, mask: FieldMask) {
        macro_rules! merge {
            ($flag:ident, $field:ident) => {
                if mask.contains(FieldMask::$flag) {
                    self.$field = values.$field.clone();
                }
            };
        }
        merge!(REVISION, revision);
        merge!(URL, url);
        merge!(REPOS, repos);
        merge!(UUID, uuid);
        merge!(KIND, kind);
        merge!(SCHEDULE, schedule);
        merge!(COPIED, copied);
        merge!(DELETED, deleted);
        merge!(ABSENT, absent);
        merge!(INCOMPLETE, incomplete);
        merge!(COPYFROM_URL, copyfrom_url);
        merge!(COPYFROM_REV, copyfrom_rev);
        merge!(CONFLICT_OLD, conflict_old);
        merge!(CONFLICT_NEW, conflict_new);
        merge!(CONFLICT_WRK, conflict_wrk);
        merge!(PREJFILE, prejfile);
        merge!(TEXT_TIME, text_time);
        merge!(PROP_TIME, prop_time);
        merge!(CHECKSUM, checksum);
        merge!(CMT_REV, committed_rev);
        merge!(CMT_DATE, committed_date);
        merge!(CMT_AUTHOR, committed_author);
        merge!(LOCK_TOKEN, lock_token);
        merge!(LOCK_OWNER, lock_owner);
        merge!(LOCK_COMMENT, lock_comment);
        merge!(LOCK_CREATION_DATE, lock_creation_date);
        merge!(HAS_PROPS, has_props);
        merge!(HAS_PROP_MODS, has_prop_mods);
        merge!(CACHABLE_PROPS, cachable_props);
        merge!(PRESENT_PROPS, present_props);
    }

    /// Writes the fields selected by `mask` as attributes on `element`.
    ///
    /// Booleans encode as attribute presence; a masked-but-false boolean
    /// is simply omitted, which decodes back to false. [`NodeKind::None`]
    /// likewise omits its attribute.
    pub fn write_masked_attrs(&self, element: &mut Element, mask: FieldMask) {
        macro_rules! put_opt {
            ($flag:ident, $field:ident, $attr:ident) => {
                if mask.contains(FieldMask::$flag) {
                    if let Some(value) = &self.$field {
                        element.set_attr(attr::$attr, value.clone());
                    }
                }
            };
        }
        macro_rules! put_num {
            ($flag:ident, $field:ident, $attr:ident) => {
                if mask.contains(FieldMask::$flag) {
                    if let Some(value) = self.$field {
                        element.set_attr(attr::$attr, value.to_string());
                    }
                }
            };
        }
        macro_rules! put_bool {
            ($flag:ident, $field:ident, $attr:ident) => {
                if mask.contains(FieldMask::$flag) && self.$field {
                    element.set_attr(attr::$attr, WIRE_TRUE);
                }
            };
        }

        put_num!(REVISION, revision, REVISION);
        put_opt!(URL, url, URL);
        put_opt!(REPOS, repos, REPOS);
        put_opt!(UUID, uuid, UUID);
        if mask.contains(FieldMask::KIND)
            && let Some(kind) = self.kind.as_wire()
        {
            element.set_attr(attr::KIND, kind);
        }
        if mask.contains(FieldMask::SCHEDULE) {
            element.set_attr(attr::SCHEDULE, self.schedule.as_wire());
        }
        put_bool!(COPIED, copied, COPIED);
        put_bool!(DELETED, deleted, DELETED);
        put_bool!(ABSENT, absent, ABSENT);
        put_bool!(INCOMPLETE, incomplete, INCOMPLETE);
        put_opt!(COPYFROM_URL, copyfrom_url, COPYFROM_URL);
        put_num!(COPYFROM_REV, copyfrom_rev, COPYFROM_REV);
        put_opt!(CONFLICT_OLD, conflict_old, CONFLICT_OLD);
        put_opt!(CONFLICT_NEW, conflict_new, CONFLICT_NEW);
        put_opt!(CONFLICT_WRK, conflict_wrk, CONFLICT_WRK);
        put_opt!(PREJFILE, prejfile, PREJFILE);
        if mask.contains(FieldMask::TEXT_TIME)
            && let Some(time) = &self.text_time
        {
            element.set_attr(attr::TEXT_TIME, time.as_wire());
        }
        if mask.contains(FieldMask::PROP_TIME)
            && let Some(time) = &self.prop_time
        {
            element.set_attr(attr::PROP_TIME, time.as_wire());
        }
        put_opt!(CHECKSUM, checksum, CHECKSUM);
        put_num!(CMT_REV, committed_rev, CMT_REV);
        put_opt!(CMT_DATE, committed_date, CMT_DATE);
        put_opt!(CMT_AUTHOR, committed_author, CMT_AUTHOR);
        put_opt!(LOCK_TOKEN, lock_token, LOCK_TOKEN);
        put_opt!(LOCK_OWNER, lock_owner, LOCK_OWNER);
        put_opt!(LOCK_COMMENT, lock_comment, LOCK_COMMENT);
        put_opt!(LOCK_CREATION_DATE, lock_creation_date, LOCK_CREATION_DATE);
        put_bool!(HAS_PROPS, has_props, HAS_PROPS);
        put_bool!(HAS_PROP_MODS, has_prop_mods, HAS_PROP_MODS);
        put_opt!(CACHABLE_PROPS, cachable_props, CACHABLE_PROPS);
        put_opt!(PRESENT_PROPS, present_props, PRESENT_PROPS);
    }

    /// Returns the mask of fields holding non-default values.
    #[must_use]
    pub fn populated_mask(&self) -> FieldMask {
        let mut mask = FieldMask::empty();
        macro_rules! probe_opt {
            ($flag:ident, $field:ident) => {
                if self.$field.is_some() {
                    mask |= FieldMask::$flag;
                }
            };
        }
        macro_rules! probe_bool {
            ($flag:ident, $field:ident) => {
                if self.$field {
                    mask |= FieldMask::$flag;
                }
            };
        }
        probe_opt!(REVISION, revision);
        probe_opt!(URL, url);
        probe_opt!(REPOS, repos);
        probe_opt!(UUID, uuid);
        if self.kind != NodeKind::None {
            mask |= FieldMask::KIND;
        }
        if self.schedule != Schedule::Normal {
            mask |= FieldMask::SCHEDULE;
        }
        probe_bool!(COPIED, copied);
        probe_bool!(DELETED, deleted);
        probe_bool!(ABSENT, absent);
        probe_bool!(INCOMPLETE, incomplete);
        probe_opt!(COPYFROM_URL, copyfrom_url);
        probe_opt!(COPYFROM_REV, copyfrom_rev);
        probe_opt!(CONFLICT_OLD, conflict_old);
        probe_opt!(CONFLICT_NEW, conflict_new);
        probe_opt!(CONFLICT_WRK, conflict_wrk);
        probe_opt!(PREJFILE, prejfile);
        probe_opt!(TEXT_TIME, text_time);
        probe_opt!(PROP_TIME, prop_time);
        probe_opt!(CHECKSUM, checksum);
        probe_opt!(CMT_REV, committed_rev);
        probe_opt!(CMT_DATE, committed_date);
        probe_opt!(CMT_AUTHOR, committed_author);
        probe_opt!(LOCK_TOKEN, lock_token);
        probe_opt!(LOCK_OWNER, lock_owner);
        probe_opt!(LOCK_COMMENT, lock_comment);
        probe_opt!(LOCK_CREATION_DATE, lock_creation_date);
        probe_bool!(HAS_PROPS, has_props);
        probe_bool!(HAS_PROP_MODS, has_prop_mods);
        probe_opt!(CACHABLE_PROPS, cachable_props);
        probe_opt!(PRESENT_PROPS, present_props);
        mask
    }

    /// Serializes the record as an `entry` element carrying every
    /// populated field.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut element = Element::new("entry");
        element.set_attr(attr::NAME, self.name.clone());
        self.write_masked_attrs(&mut element, self.populated_mask());
        element
    }

    /// Decodes an element into a record plus the mask of attributes that
    /// were actually present.
    ///
    /// Boolean attributes count as present only when they appear (their
    /// value must be `true`); absent booleans stay false and unmasked.
    pub fn from_element(element: &Element, path_hint: &std::path::Path) -> Result<(Self, FieldMask), EntriesError> {
        let malformed = |detail: String| EntriesError::Malformed {
            path: path_hint.to_path_buf(),
            detail,
        };

        let mut entry = Entry::named(element.attr(attr::NAME).unwrap_or_default());
        let mut mask = FieldMask::empty();

        macro_rules! get_opt {
            ($flag:ident, $field:ident, $attr:ident) => {
                if let Some(value) = element.attr(attr::$attr) {
                    entry.$field = Some(value.to_owned());
                    mask |= FieldMask::$flag;
                }
            };
        }
        macro_rules! get_num {
            ($flag:ident, $field:ident, $attr:ident) => {
                if let Some(value) = element.attr(attr::$attr) {
                    let parsed = value.parse::<u64>().map_err(|_| {
                        malformed(format!(
                            "invalid {} '{value}'",
                            attr::$attr
                        ))
                    })?;
                    entry.$field = Some(parsed);
                    mask |= FieldMask::$flag;
                }
            };
        }
        macro_rules! get_bool {
            ($flag:ident, $field:ident, $attr:ident) => {
                if let Some(value) = element.attr(attr::$attr) {
                    if value != WIRE_TRUE {
                        return Err(malformed(format!(
                            "invalid {} '{value}'",
                            attr::$attr
                        )));
                    }
                    entry.$field = true;
                    mask |= FieldMask::$flag;
                }
            };
        }

        get_num!(REVISION, revision, REVISION);
        get_opt!(URL, url, URL);
        get_opt!(REPOS, repos, REPOS);
        get_opt!(UUID, uuid, UUID);
        if let Some(value) = element.attr(attr::KIND) {
            entry.kind = NodeKind::from_wire(Some(value))
                .ok_or_else(|| malformed(format!("invalid kind '{value}'")))?;
            mask |= FieldMask::KIND;
        }
        if let Some(value) = element.attr(attr::SCHEDULE) {
            entry.schedule = Schedule::from_wire(value)
                .ok_or_else(|| malformed(format!("invalid schedule '{value}'")))?;
            mask |= FieldMask::SCHEDULE;
        }
        get_bool!(COPIED, copied, COPIED);
        get_bool!(DELETED, deleted, DELETED);
        get_bool!(ABSENT, absent, ABSENT);
        get_bool!(INCOMPLETE, incomplete, INCOMPLETE);
        get_opt!(COPYFROM_URL, copyfrom_url, COPYFROM_URL);
        get_num!(COPYFROM_REV, copyfrom_rev, COPYFROM_REV);
        get_opt!(CONFLICT_OLD, conflict_old, CONFLICT_OLD);
        get_opt!(CONFLICT_NEW, conflict_new, CONFLICT_NEW);
        get_opt!(CONFLICT_WRK, conflict_wrk, CONFLICT_WRK);
        get_opt!(PREJFILE, prejfile, PREJFILE);
        if let Some(value) = element.attr(attr::TEXT_TIME) {
            entry.text_time = Some(Timestamp::from_wire(value));
            mask |= FieldMask::TEXT_TIME;
        }
        if let Some(value) = element.attr(attr::PROP_TIME) {
            entry.prop_time = Some(Timestamp::from_wire(value));
            mask |= FieldMask::PROP_TIME;
        }
        get_opt!(CHECKSUM, checksum, CHECKSUM);
        get_num!(CMT_REV, committed_rev, CMT_REV);
        get_opt!(CMT_DATE, committed_date, CMT_DATE);
        get_opt!(CMT_AUTHOR, committed_author, CMT_AUTHOR);
        get_opt!(LOCK_TOKEN, lock_token, LOCK_TOKEN);
        get_opt!(LOCK_OWNER, lock_owner, LOCK_OWNER);
        get_opt!(LOCK_COMMENT, lock_comment, LOCK_COMMENT);
        get_opt!(LOCK_CREATION_DATE, lock_creation_date, LOCK_CREATION_DATE);
        get_bool!(HAS_PROPS, has_props, HAS_PROPS);
        get_bool!(HAS_PROP_MODS, has_prop_mods, HAS_PROP_MODS);
        get_opt!(CACHABLE_PROPS, cachable_props, CACHABLE_PROPS);
        get_opt!(PRESENT_PROPS, present_props, PRESENT_PROPS);

        Ok((entry, mask))
    }
}
