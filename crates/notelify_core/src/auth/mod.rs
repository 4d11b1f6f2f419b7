//! Identity boundary for the notes session.
//!
//! # Responsibility
//! - Expose the current owner identifier to sync and mutation code.
//! - Emit login/logout transitions that downstream code treats as hard
//!   resets.

pub mod gate;
