//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store writes and cache effects into use-case level APIs.
//! - Keep UI layers decoupled from store and sync details.

pub mod editor;
pub mod mutation_gateway;
pub mod notes_session;
