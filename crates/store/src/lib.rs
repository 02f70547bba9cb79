//! slicekit - Generic entity store slices.
//!
//! A slice owns the cached client-side state of one entity type and performs
//! asynchronous fetch, create, update and delete operations against a REST
//! persistence service, with the same state transitions whatever the outcome.
//!
//! # Architecture
//!
//! - [`slice`] - [`EntitySlice`], the operations and their state transitions
//! - [`store`] - [`Store`], the per-session container of slices
//! - [`backend`] - [`EntityBackend`], the seam between a slice and persistence
//! - [`client`] - The reqwest-based REST backend
//! - [`memory`] - An in-memory backend for tests and demos
//! - [`query`], [`pagination`], [`patch`] - Request and response helpers
//! - [`config`] - Client configuration from environment variables
//! - [`error`] - [`SliceError`], the error taxonomy of every operation
//!
//! # Example
//!
//! ```no_run
//! use slicekit::{ClientConfig, RestClient, RestSlice};
//! use slicekit_core::entities::StrapColor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let client = RestClient::new(&config)?;
//! let colors = RestSlice::<StrapColor>::from_client(&client, config.concurrency);
//!
//! let saved = colors.create_entity(&StrapColor::new("Red")).await?;
//! assert!(colors.state().update_success);
//! assert_eq!(colors.state().entity, saved);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod pagination;
pub mod patch;
pub mod query;
pub mod slice;
pub mod store;

pub use backend::{EntityBackend, Page};
pub use client::{RestClient, RestResource};
pub use config::{ClientConfig, ConfigError};
pub use error::{FieldError, Problem, SliceError};
pub use memory::MemoryBackend;
pub use patch::Patch;
pub use query::{Direction, QueryParams, Sort};
pub use slice::{ConcurrencyPolicy, EntitySlice, RestSlice};
pub use store::{Store, StoreBuilder};
