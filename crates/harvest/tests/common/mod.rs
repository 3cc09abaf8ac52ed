//! Shared helpers for harvest integration tests.
//!
//! - `TestHarness` owns an isolated data root, temp base and in-memory catalog
//! - `ZipBuilder` assembles archives, including hostile ones

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
