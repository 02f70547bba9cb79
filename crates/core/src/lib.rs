//! slicekit core - Shared entity and slice-state types.
//!
//! This crate provides the types every slicekit component agrees on:
//! - `slicekit` - The async entity store slices and REST backend
//! - `slicekit-cli` - Command-line driver for slices
//! - `slicekit-integration-tests` - End-to-end tests against an in-process service
//!
//! # Architecture
//!
//! The core crate contains only types, traits and the pure state reducer - no
//! I/O, no HTTP clients, no async runtime. This keeps it lightweight and allows
//! a view layer to depend on it without pulling in the network stack.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids and id-only entity references
//! - [`entity`] - The [`Entity`] trait and per-type descriptors
//! - [`state`] - [`SliceState`] and the reducer that mutates it
//! - [`entities`] - Sample entity types used by the CLI and tests

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod entities;
pub mod entity;
pub mod state;
pub mod types;

pub use entity::{Entity, EntityDescriptor, FieldDescriptor, FieldKind, FieldValueError};
pub use state::{Operation, PageLinks, SliceAction, SliceState};
pub use types::*;
