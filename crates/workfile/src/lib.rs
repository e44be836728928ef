#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Atomic installation of one working file. A [`WorkingFileWriter`]
//! stages content in a scoped temp file — optionally behind a keyword/EOL
//! translating stream — then installs it over the target path with a
//! single rename. Filesystem attributes (read-only, executable, an
//! explicit mtime) are derived from the file's properties and applied
//! only after the stream is closed, never to a file still being written.
//!
//! # Invariants
//!
//! - The temp file is removed on every exit path that does not install:
//!   explicit [`WorkingFileWriter::close`], or drop.
//! - Special (symlink) files are staged as their detranslated
//!   representation and re-created as symlinks at install; no attribute
//!   application happens to them.
//! - A missing parent directory at install time surfaces as an error;
//!   the writer never creates directories on the caller's behalf.

mod error;
#[cfg(test)]
mod tests;
mod writer;

pub use error::WorkfileError;
pub use writer::{InstallParams, WorkingFileWriter};
