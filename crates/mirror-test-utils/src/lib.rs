//! Test utilities for the labmirror workspace.
//!
//! Factories create domain values with sensible defaults; [`FakeRemote`] is
//! a working in-memory store implementing every client port, with a call
//! recorder for order and dry-run assertions.

pub mod attachments;
pub mod datasets;
pub mod entities;
pub mod fake_remote;
pub mod time;

pub use fake_remote::{FakeRemote, RecordedCall};
