#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! The entry table: one metadata record per versioned path in a
//! working-copy directory, plus the cached-property ("wcprop") store.
//!
//! An [`Entry`] carries the full versioned-resource record — kind,
//! schedule, revision, URL, checksums, lock fields, conflict markers,
//! timestamps. Records are mutated exclusively through masked updates:
//! [`Entry::apply`] merges only the fields selected by a [`FieldMask`],
//! leaving every other field untouched. That contract is what lets the
//! operation log replay `modify-entry` instructions idempotently.
//!
//! # Design
//!
//! - [`EntryTable`] owns every entry of one directory, keyed by entry
//!   name. The directory's own record uses the empty name
//!   ([`THIS_DIR`]). Load and persist are whole-table operations; the
//!   log runner flushes at most once per pass.
//! - Serialization reuses the element codec from the `adm` crate. The
//!   attribute vocabulary is fixed by the on-disk format and must not
//!   drift (see [`entry::attr`]).
//! - Timestamps are a tagged value: [`Timestamp::Literal`] carries an
//!   ISO-8601 instant, [`Timestamp::UseCurrentFileTime`] is the explicit
//!   form of the `working` wire sentinel meaning "resolve against the
//!   target file's mtime at execution time".

pub mod entry;
pub mod error;
pub mod fields;
pub mod props;
pub mod table;
pub mod timeformat;
pub mod types;

pub use entry::Entry;
pub use error::EntriesError;
pub use fields::FieldMask;
pub use props::PropertyList;
pub use table::{EntryTable, THIS_DIR};
pub use types::{NodeKind, Schedule, Timestamp};
