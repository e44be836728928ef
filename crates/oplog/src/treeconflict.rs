//! Structured tree-conflict records.
//!
//! When an incoming change collides with a local structural change (an
//! edit against a delete, a delete against a delete), the victim's
//! parent directory records a descriptor: who, what kind of node, which
//! operation raised it, what the incoming action was, and why the local
//! side could not accept it. Descriptors live in their own
//! administrative file, one element per victim, and a victim can carry
//! at most one.

use std::fs;
use std::io;
use std::path::Path;

use adm::{Element, codec, fsutil, layout};
use entries::NodeKind;

use crate::error::{LogError, LogResult};

const TAG: &str = "tree-conflict";
const ATTR_VICTIM: &str = "victim";
const ATTR_KIND: &str = "kind";
const ATTR_OPERATION: &str = "operation";
const ATTR_ACTION: &str = "action";
const ATTR_REASON: &str = "reason";

/// The operation that discovered the conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictOperation {
    /// An update brought the incoming change.
    Update,
    /// A switch brought the incoming change.
    Switch,
    /// A merge brought the incoming change.
    Merge,
}

impl ConflictOperation {
    const fn as_wire(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Switch => "switch",
            Self::Merge => "merge",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "update" => Some(Self::Update),
            "switch" => Some(Self::Switch),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

/// What the incoming change tried to do to the victim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictAction {
    /// Incoming edit.
    Edit,
    /// Incoming add.
    Add,
    /// Incoming delete.
    Delete,
}

impl ConflictAction {
    const fn as_wire(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Add => "add",
            Self::Delete => "delete",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "edit" => Some(Self::Edit),
            "add" => Some(Self::Add),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Why the local side could not accept the incoming change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictReason {
    /// Locally edited.
    Edited,
    /// Obstructed by an unversioned node.
    Obstructed,
    /// Locally deleted.
    Deleted,
    /// Locally missing.
    Missing,
    /// An unversioned node is in the way.
    Unversioned,
}

impl ConflictReason {
    const fn as_wire(self) -> &'static str {
        match self {
            Self::Edited => "edited",
            Self::Obstructed => "obstructed",
            Self::Deleted => "deleted",
            Self::Missing => "missing",
            Self::Unversioned => "unversioned",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "edited" => Some(Self::Edited),
            "obstructed" => Some(Self::Obstructed),
            "deleted" => Some(Self::Deleted),
            "missing" => Some(Self::Missing),
            "unversioned" => Some(Self::Unversioned),
            _ => None,
        }
    }
}

/// One recorded tree conflict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeConflict {
    /// Basename of the conflicted node within its parent.
    pub victim: String,
    /// Kind of the victim node.
    pub node_kind: NodeKind,
    /// Operation that raised the conflict.
    pub operation: ConflictOperation,
    /// The incoming action.
    pub action: ConflictAction,
    /// The local state that refused it.
    pub reason: ConflictReason,
}

impl TreeConflict {
    fn to_element(&self) -> Element {
        let mut element = Element::new(TAG).with_attr(ATTR_VICTIM, &self.victim);
        if let Some(kind) = self.node_kind.as_wire() {
            element.set_attr(ATTR_KIND, kind);
        }
        element.set_attr(ATTR_OPERATION, self.operation.as_wire());
        element.set_attr(ATTR_ACTION, self.action.as_wire());
        element.set_attr(ATTR_REASON, self.reason.as_wire());
        element
    }

    fn from_element(element: &Element) -> LogResult<Self> {
        if element.tag() != TAG {
            return Err(LogError::unknown_instruction(element.tag()));
        }
        let victim = element
            .attr(ATTR_VICTIM)
            .ok_or_else(|| LogError::missing_attribute(TAG, ATTR_VICTIM))?
            .to_owned();
        let node_kind = NodeKind::from_wire(element.attr(ATTR_KIND)).ok_or_else(|| {
            LogError::invalid_attribute(TAG, ATTR_KIND, element.attr(ATTR_KIND).unwrap_or(""))
        })?;
        let operation = element
            .attr(ATTR_OPERATION)
            .and_then(ConflictOperation::from_wire)
            .ok_or_else(|| {
                LogError::invalid_attribute(
                    TAG,
                    ATTR_OPERATION,
                    element.attr(ATTR_OPERATION).unwrap_or(""),
                )
            })?;
        let action = element
            .attr(ATTR_ACTION)
            .and_then(ConflictAction::from_wire)
            .ok_or_else(|| {
                LogError::invalid_attribute(
                    TAG,
                    ATTR_ACTION,
                    element.attr(ATTR_ACTION).unwrap_or(""),
                )
            })?;
        let reason = element
            .attr(ATTR_REASON)
            .and_then(ConflictReason::from_wire)
            .ok_or_else(|| {
                LogError::invalid_attribute(
                    TAG,
                    ATTR_REASON,
                    element.attr(ATTR_REASON).unwrap_or(""),
                )
            })?;
        Ok(Self {
            victim,
            node_kind,
            operation,
            action,
            reason,
        })
    }
}

/// Reads every tree conflict recorded under `dir`, in file order.
pub fn read_tree_conflicts(dir: &Path) -> LogResult<Vec<TreeConflict>> {
    let path = layout::adm_path(dir, &[layout::ADM_TREE_CONFLICTS]);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(LogError::io("read tree conflicts", path, error)),
    };
    let elements = codec::parse_all(&text)?;
    elements.iter().map(TreeConflict::from_element).collect()
}

/// Looks up the recorded conflict for `victim`, if any.
pub fn tree_conflict_for(dir: &Path, victim: &str) -> LogResult<Option<TreeConflict>> {
    Ok(read_tree_conflicts(dir)?
        .into_iter()
        .find(|conflict| conflict.victim == victim))
}

/// Appends one conflict descriptor to the directory's record.
///
/// A victim carries at most one descriptor; recording a second is the
/// caller's bug and fails.
pub fn add_tree_conflict(dir: &Path, conflict: &TreeConflict) -> LogResult<()> {
    let mut existing = read_tree_conflicts(dir)?;
    if existing.iter().any(|other| other.victim == conflict.victim) {
        return Err(LogError::duplicate_conflict(&conflict.victim));
    }
    existing.push(conflict.clone());
    write_tree_conflicts(dir, &existing)
}

/// Removes the descriptor for `victim`, if present.
pub fn remove_tree_conflict(dir: &Path, victim: &str) -> LogResult<()> {
    let mut existing = read_tree_conflicts(dir)?;
    let before = existing.len();
    existing.retain(|conflict| conflict.victim != victim);
    if existing.len() == before {
        return Ok(());
    }
    write_tree_conflicts(dir, &existing)
}

fn write_tree_conflicts(dir: &Path, conflicts: &[TreeConflict]) -> LogResult<()> {
    let path = layout::adm_path(dir, &[layout::ADM_TREE_CONFLICTS]);
    if conflicts.is_empty() {
        return fsutil::remove_file_if_present(&path)
            .map(|_| ())
            .map_err(|error| LogError::io("remove tree conflicts", path, error));
    }
    let elements: Vec<_> = conflicts.iter().map(TreeConflict::to_element).collect();
    fsutil::write_atomic(&path, codec::write_all(&elements).as_bytes())
        .map_err(|error| LogError::io("write tree conflicts", path, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(victim: &str) -> TreeConflict {
        TreeConflict {
            victim: victim.to_owned(),
            node_kind: NodeKind::File,
            operation: ConflictOperation::Update,
            action: ConflictAction::Delete,
            reason: ConflictReason::Edited,
        }
    }

    #[test]
    fn record_and_look_up() {
        let temp = tempfile::tempdir().unwrap();
        layout::create_adm_area(temp.path()).unwrap();

        add_tree_conflict(temp.path(), &sample("iota")).unwrap();
        add_tree_conflict(temp.path(), &sample("mu")).unwrap();

        let found = tree_conflict_for(temp.path(), "iota").unwrap().unwrap();
        assert_eq!(found, sample("iota"));
        assert!(tree_conflict_for(temp.path(), "rho").unwrap().is_none());
        assert_eq!(read_tree_conflicts(temp.path()).unwrap().len(), 2);
    }

    #[test]
    fn one_descriptor_per_victim() {
        let temp = tempfile::tempdir().unwrap();
        layout::create_adm_area(temp.path()).unwrap();
        add_tree_conflict(temp.path(), &sample("iota")).unwrap();
        let error = add_tree_conflict(temp.path(), &sample("iota")).unwrap_err();
        assert!(error.to_string().contains("iota"));
    }

    #[test]
    fn removing_the_last_descriptor_drops_the_file() {
        let temp = tempfile::tempdir().unwrap();
        layout::create_adm_area(temp.path()).unwrap();
        add_tree_conflict(temp.path(), &sample("iota")).unwrap();
        remove_tree_conflict(temp.path(), "iota").unwrap();
        assert!(
            !layout::adm_path(temp.path(), &[layout::ADM_TREE_CONFLICTS]).exists()
        );
        remove_tree_conflict(temp.path(), "iota").unwrap();
    }

    #[test]
    fn survives_a_reload() {
        let temp = tempfile::tempdir().unwrap();
        layout::create_adm_area(temp.path()).unwrap();
        let conflict = TreeConflict {
            victim: "A".to_owned(),
            node_kind: NodeKind::Dir,
            operation: ConflictOperation::Merge,
            action: ConflictAction::Add,
            reason: ConflictReason::Unversioned,
        };
        add_tree_conflict(temp.path(), &conflict).unwrap();
        let loaded = read_tree_conflicts(temp.path()).unwrap();
        assert_eq!(loaded, vec![conflict]);
    }
}
