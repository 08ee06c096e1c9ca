//! Internal implementation details of the engine.
//!
//! Only the history arena is public, since [Snapshot](crate::Snapshot) views are built on it.

pub(crate) mod cell;
pub(crate) mod exec;
pub mod history;
pub(crate) mod profile;
pub(crate) mod task;
