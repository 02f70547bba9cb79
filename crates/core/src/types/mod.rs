//! Core types for slicekit.
//!
//! This module provides type-safe wrappers for entity identifiers and the
//! id-only references entities use to point at each other.

pub mod id;
pub mod reference;

pub use id::*;
pub use reference::Reference;
