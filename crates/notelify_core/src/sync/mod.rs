//! Push-stream synchronization of the owner's notes.
//!
//! # Responsibility
//! - Keep one authoritative in-memory cache per session.
//! - Reconcile pushed snapshots with optimistic local effects: the next
//!   snapshot always replaces the cache wholesale.

pub mod cache;
pub mod engine;
