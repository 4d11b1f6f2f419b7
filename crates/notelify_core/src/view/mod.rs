//! Presentation selectors derived from the note cache.
//!
//! # Responsibility
//! - Derive filtered and projected views for the UI.
//! - Stay stateless with respect to the cache.

pub mod selector;
