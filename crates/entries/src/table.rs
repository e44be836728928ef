//! Whole-directory entry tables: bulk load, bulk persist.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use adm::{codec, fsutil, layout};

use crate::entry::Entry;
use crate::error::EntriesError;

/// Name of the directory's own record inside its table.
pub const THIS_DIR: &str = "";

/// Every entry of one working-copy directory, keyed by entry name.
///
/// The table is loaded and persisted as a unit; incremental on-disk
/// updates do not exist. Callers batch their mutations and flush once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryTable {
    entries: BTreeMap<String, Entry>,
}

impl EntryTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Looks up an entry mutably by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.get_mut(name)
    }

    /// The directory's own record, when present.
    #[must_use]
    pub fn this_dir(&self) -> Option<&Entry> {
        self.get(THIS_DIR)
    }

    /// The directory's own record, mutably.
    pub fn this_dir_mut(&mut self) -> Option<&mut Entry> {
        self.get_mut(THIS_DIR)
    }

    /// Inserts or replaces `entry`, keyed by its name.
    pub fn insert(&mut self, entry: Entry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Fetches `name` or inserts an empty record for it.
    pub fn entry_or_default(&mut self, name: &str) -> &mut Entry {
        self.entries
            .entry(name.to_owned())
            .or_insert_with(|| Entry::named(name))
    }

    /// Removes `name` from the table. Returns the removed record.
    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        self.entries.remove(name)
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Entry names, in order, excluding the directory's own record.
    #[must_use]
    pub fn child_names(&self) -> Vec<String> {
        self.entries
            .keys()
            .filter(|name| !name.is_empty())
            .cloned()
            .collect()
    }

    /// Number of records, the directory's own included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads the entry table of `dir`.
    ///
    /// A missing entries file yields an empty table; a directory without
    /// an administrative area is the caller's problem to detect first.
    pub fn read(dir: &Path) -> Result<Self, EntriesError> {
        let path = layout::adm_path(dir, &[layout::ADM_ENTRIES]);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(error) => return Err(EntriesError::io("read entry table", path, error)),
        };
        let mut table = Self::new();
        for element in codec::parse_all(&text)? {
            if element.tag() != "entry" {
                return Err(EntriesError::Malformed {
                    path,
                    detail: format!("unexpected element '{}'", element.tag()),
                });
            }
            let (entry, _) = Entry::from_element(&element, &path)?;
            table.insert(entry);
        }
        Ok(table)
    }

    /// Persists the table atomically into the administrative area of
    /// `dir`.
    pub fn write(&self, dir: &Path) -> Result<(), EntriesError> {
        let path = layout::adm_path(dir, &[layout::ADM_ENTRIES]);
        let elements: Vec<_> = self.iter().map(Entry::to_element).collect();
        let text = codec::write_all(&elements);
        fsutil::write_atomic(&path, text.as_bytes())
            .map_err(|error| EntriesError::io("write entry table", path, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeKind, Schedule};

    fn seeded_table() -> EntryTable {
        let mut table = EntryTable::new();
        let mut this_dir = Entry::named(THIS_DIR);
        this_dir.kind = NodeKind::Dir;
        this_dir.revision = Some(4);
        this_dir.url = Some("https://repo/trunk".to_owned());
        table.insert(this_dir);
        let mut iota = Entry::named("iota");
        iota.kind = NodeKind::File;
        iota.schedule = Schedule::Add;
        table.insert(iota);
        table
    }

    #[test]
    fn read_of_missing_table_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        adm::layout::create_adm_area(temp.path()).unwrap();
        let table = EntryTable::read(temp.path()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn write_read_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        adm::layout::create_adm_area(temp.path()).unwrap();
        let table = seeded_table();
        table.write(temp.path()).unwrap();
        let loaded = EntryTable::read(temp.path()).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn child_names_exclude_this_dir() {
        let table = seeded_table();
        assert_eq!(table.child_names(), vec!["iota".to_owned()]);
        assert!(table.this_dir().is_some());
    }

    #[test]
    fn foreign_elements_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        adm::layout::create_adm_area(temp.path()).unwrap();
        let path = adm::layout::adm_path(temp.path(), &[adm::layout::ADM_ENTRIES]);
        std::fs::write(&path, "<mv name=\"a\" dest=\"b\"/>\n").unwrap();
        assert!(EntryTable::read(temp.path()).is_err());
    }
}
