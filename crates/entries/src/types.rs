//! Enumerations and tagged values shared across the entry model.

/// Kind of a versioned node.
///
/// The wire strings are part of the on-disk format: an absent `kind`
/// attribute decodes as [`NodeKind::None`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeKind {
    /// Absent or unversioned.
    #[default]
    None,
    /// A regular file.
    File,
    /// A directory.
    Dir,
    /// Present but of undetermined kind.
    Unknown,
}

impl NodeKind {
    /// Wire representation; [`NodeKind::None`] has none (the attribute is
    /// omitted).
    #[must_use]
    pub const fn as_wire(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::File => Some("file"),
            Self::Dir => Some("dir"),
            Self::Unknown => Some("unknown"),
        }
    }

    /// Decodes the wire representation.
    #[must_use]
    pub fn from_wire(value: Option<&str>) -> Option<Self> {
        match value {
            None => Some(Self::None),
            Some("file") => Some(Self::File),
            Some("dir") => Some(Self::Dir),
            Some("unknown") => Some(Self::Unknown),
            Some(_) => None,
        }
    }
}

/// Pending-change state of an entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Schedule {
    /// No pending structural change.
    #[default]
    Normal,
    /// Scheduled for addition.
    Add,
    /// Scheduled for deletion.
    Delete,
    /// Scheduled for replacement (delete plus re-add).
    Replace,
}

impl Schedule {
    /// Wire representation; `Normal` encodes as the empty string.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Replace => "replace",
        }
    }

    /// Decodes the wire representation.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "" => Some(Self::Normal),
            "add" => Some(Self::Add),
            "delete" => Some(Self::Delete),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }
}

/// Wire sentinel requesting execution-time timestamp resolution.
pub const WIRE_TIMESTAMP_WC: &str = "working";

/// A timestamp field value.
///
/// The on-disk format overloads the timestamp attribute with a sentinel
/// string meaning "use the target file's mtime as of execution". Keeping
/// the two cases as a tagged value avoids any collision between the
/// sentinel and a genuine instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Timestamp {
    /// A literal ISO-8601 instant (`2008-01-01T12:00:00.000000Z`).
    Literal(String),
    /// Resolve against the target file's mtime when the instruction runs.
    UseCurrentFileTime,
}

impl Timestamp {
    /// Wire representation.
    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Literal(value) => value,
            Self::UseCurrentFileTime => WIRE_TIMESTAMP_WC,
        }
    }

    /// Decodes the wire representation.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        if value == WIRE_TIMESTAMP_WC {
            Self::UseCurrentFileTime
        } else {
            Self::Literal(value.to_owned())
        }
    }
}
