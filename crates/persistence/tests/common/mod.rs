//! Test infrastructure for the persistence layer.
//!
//! This module provides the user directory and share code doubles, fixture
//! builders, and a harness wiring them to an in-memory backend.

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
