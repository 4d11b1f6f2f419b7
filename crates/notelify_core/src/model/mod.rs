//! Domain model for owned text notes.
//!
//! # Responsibility
//! - Define the canonical note record shared by sync, mutation and view code.
//! - Normalize raw store records into that record.
//!
//! # Invariants
//! - Every note is identified by a store-assigned `NoteId`.
//! - Deletion is a hard removal; there are no client-visible tombstones.

pub mod note;
