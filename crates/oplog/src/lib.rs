#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! The operation log: a replayable, idempotent journal of working-copy
//! mutations. Operations accumulate instructions in a [`LogAccumulator`],
//! persist them atomically as numbered segments inside the directory's
//! administrative area, and hand them to [`run_log`] for execution. A
//! crash at any point leaves a state [`rerun_log`] (or [`cleanup`]) can
//! finish from.
//!
//! # Design
//!
//! - Instructions are the element vocabulary in [`instruction`];
//!   encoding is infallible, decoding and execution treat segment text
//!   as untrusted input.
//! - The runner batches entry-table and cached-property writes: one
//!   flush per pass, after which the consumed segments are deleted.
//! - Post-commit finalization (the `committed` instruction) owns the
//!   staged-pristine handoff, deletion tombstones, and the destruction
//!   sentinel that tears down committed-deleted directories.
//!
//! # Invariants
//!
//! - Replaying any prefix of a pass and then the whole pass again
//!   converges on the same final state.
//! - A missing instruction target is corruption during the first run
//!   and an already-done no-op during a rerun.
//! - Once the destruction sentinel exists, every later pass over the
//!   directory completes the destruction before doing anything else.

mod accum;
mod cleanup;
mod committed;
mod error;
mod instruction;
mod killme;
mod merge;
mod remove;
mod runner;
#[cfg(test)]
mod tests;
mod treeconflict;

pub use accum::{LogAccumulator, write_log_segment};
pub use cleanup::{CancelProbe, cleanup};
pub use error::{LogError, LogErrorKind, LogResult};
pub use instruction::{CopyMode, LogInstruction, attr, tag};
pub use killme::{killme_present, run_killme};
pub use runner::{rerun_log, run_log};
pub use treeconflict::{
    ConflictAction, ConflictOperation, ConflictReason, TreeConflict, add_tree_conflict,
    read_tree_conflicts, remove_tree_conflict, tree_conflict_for,
};
