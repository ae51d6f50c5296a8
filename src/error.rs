//! # Error Types
//!
//! This module defines all error types for the partita engine.
//!
//! Only protocol misuse is an error: feeding a partition that is already
//! sealed, sealing twice, or resolving commands before any partition has
//! been sealed. Incoherent partition *content* (orphan releases, double
//! starts) is never an error — the engine absorbs it and degrades to
//! empty batches, see the `partition` and `render` modules.
//!
//! ## Usage
//! ```rust
//! use partita::{NoteEvent, PartitaError, Renderer};
//!
//! let mut renderer = Renderer::new();
//! renderer.push_event(1, NoteEvent::onset(60, 100, 1)).unwrap();
//! renderer.finalize().unwrap();
//!
//! match renderer.push_event(1, NoteEvent::onset(62, 100, 1)) {
//!     Err(PartitaError::Sealed) => {} // expected: the partition is closed
//!     other => panic!("push after finalize must fail: {:?}", other),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitaError {
    /// The partition has been sealed; no further events may be pushed.
    ///
    /// Returned by `push_event` after `finalize` has been called.
    #[error("partition is sealed: no further events may be pushed")]
    Sealed,

    /// `finalize` was called on an already sealed partition.
    ///
    /// Sealing is a one-shot operation; a second call is reported rather
    /// than silently ignored.
    #[error("partition is already sealed")]
    AlreadySealed,

    /// A command was resolved before any partition was sealed.
    ///
    /// `combine` (and `has_events` lookahead over buffered releases) only
    /// make sense against a sealed partition.
    #[error("no sealed partition: call finalize before resolving commands")]
    NotSealed,
}
