#![deny(unsafe_code)]

//! Shared working-copy fixtures for workspace tests.

use std::fs;
use std::path::{Path, PathBuf};

use adm::layout;
use entries::{Entry, EntryTable, NodeKind, PropertyList, Schedule};
use tempfile::TempDir;

/// A scratch working-copy directory with a seeded administrative area.
pub struct Fixture {
    temp: TempDir,
}

impl Fixture {
    /// A fresh single-directory working copy at revision `revision`.
    #[must_use]
    pub fn at_revision(revision: u64) -> Self {
        let temp = tempfile::tempdir().expect("create scratch directory");
        init_working_copy(temp.path(), revision);
        Self { temp }
    }

    /// The working-copy root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Shorthand for an administrative path below the root.
    #[must_use]
    pub fn adm_path(&self, parts: &[&str]) -> PathBuf {
        layout::adm_path(self.root(), parts)
    }

    /// Seeds a committed file: working file, pristine base, and entry.
    pub fn add_committed_file(&self, name: &str, contents: &[u8], revision: u64) {
        add_committed_file(self.root(), name, contents, revision);
    }

    /// Seeds a versioned child directory with its own administrative
    /// area, and records it in the parent table.
    pub fn add_committed_dir(&self, name: &str, revision: u64) -> PathBuf {
        let child = self.root().join(name);
        fs::create_dir(&child).expect("create child directory");
        init_working_copy(&child, revision);

        let mut table = EntryTable::read(self.root()).expect("read parent table");
        let mut entry = Entry::named(name);
        entry.kind = NodeKind::Dir;
        entry.revision = Some(revision);
        table.insert(entry);
        table.write(self.root()).expect("write parent table");
        child
    }

    /// Rewrites one entry's schedule.
    pub fn set_schedule(&self, name: &str, schedule: Schedule) {
        let mut table = EntryTable::read(self.root()).expect("read entry table");
        table.entry_or_default(name).schedule = schedule;
        table.write(self.root()).expect("write entry table");
    }

    /// Stores the working property list for `name`.
    pub fn set_props(&self, name: &str, pairs: &[(&str, &str)]) {
        let props: PropertyList = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        let path = layout::working_props_path(self.root(), name);
        entries::props::write_prop_file(&path, &props).expect("write property file");
    }

    /// Loads the entry table back for assertions.
    #[must_use]
    pub fn entries(&self) -> EntryTable {
        EntryTable::read(self.root()).expect("read entry table")
    }
}

/// Creates an administrative area under `dir` and seeds its own record.
pub fn init_working_copy(dir: &Path, revision: u64) {
    layout::create_adm_area(dir).expect("create administrative area");
    let mut table = EntryTable::new();
    let mut this_dir = Entry::named("");
    this_dir.kind = NodeKind::Dir;
    this_dir.revision = Some(revision);
    this_dir.url = Some(format!("https://repo.example/trunk/{revision}"));
    table.insert(this_dir);
    table.write(dir).expect("write entry table");
}

/// Seeds a committed file into an existing working copy.
pub fn add_committed_file(dir: &Path, name: &str, contents: &[u8], revision: u64) {
    fs::write(dir.join(name), contents).expect("write working file");
    fs::write(layout::text_base_path(dir, name), contents).expect("write pristine base");

    let mut table = EntryTable::read(dir).expect("read entry table");
    let mut entry = Entry::named(name);
    entry.kind = NodeKind::File;
    entry.revision = Some(revision);
    entry.committed_rev = Some(revision);
    entry.url = Some(format!("https://repo.example/trunk/{name}"));
    table.insert(entry);
    table.write(dir).expect("write entry table");
}
