#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Administrative-area primitives shared by the working-copy engine crates.
//! Every versioned directory owns a hidden `.svn` area holding its entry
//! table, cached properties, pristine text bases, pending operation-log
//! segments, and scratch space. This crate knows the layout of that area,
//! hands out exclusive directory locks through [`AdmAccess`], performs
//! atomic whole-file writes, and implements the attribute-framed element
//! codec used by both the entries file and the log segments.
//!
//! # Design
//!
//! - [`layout`] is the single source of truth for administrative file and
//!   directory names. Callers never spell `.svn` or `KILLME` themselves.
//! - [`AdmAccess`] models the advisory write lock on one directory. The
//!   lock is a `create_new` marker file; dropping the access releases it.
//! - [`fsutil`] wraps the small set of filesystem idioms the engine leans
//!   on: write-temp-then-rename, tolerant removal, permission-bit and
//!   mtime manipulation.
//! - [`codec`] parses and prints self-closing elements with quoted,
//!   entity-escaped attribute values. The vocabulary is fixed by the
//!   on-disk format; the codec itself is format-agnostic.
//!
//! # Invariants
//!
//! - No file inside the administrative area is ever partially written:
//!   every write goes through [`fsutil::write_atomic`].
//! - An [`AdmAccess`] releases its lock file exactly once, on drop or
//!   explicit [`AdmAccess::close`].

pub mod access;
pub mod codec;
pub mod error;
pub mod fsutil;
pub mod layout;

pub use access::AdmAccess;
pub use codec::Element;
pub use error::AdmError;
