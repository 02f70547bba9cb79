//! The persistence service seam.
//!
//! A slice talks to its backing store only through [`EntityBackend`]. The
//! production implementation is [`RestResource`](crate::client::RestResource);
//! [`MemoryBackend`](crate::memory::MemoryBackend) serves tests and demos.

use std::future::Future;

use slicekit_core::{Entity, PageLinks};

use crate::error::SliceError;
use crate::patch::Patch;
use crate::query::QueryParams;

/// One page of a list fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
    /// Records in service order.
    pub items: Vec<E>,
    /// Total matching records across all pages, when reported.
    pub total_items: Option<u64>,
    pub links: PageLinks,
}

impl<E> Page<E> {
    /// A page with no paging metadata.
    #[must_use]
    pub fn of(items: Vec<E>) -> Self {
        Self {
            items,
            total_items: None,
            links: PageLinks::default(),
        }
    }
}

/// Persistence operations for one entity type.
///
/// Each method performs exactly one request and never retries.
pub trait EntityBackend<E: Entity>: Send + Sync + 'static {
    /// Fetch a page of records.
    fn fetch_page(
        &self,
        query: &QueryParams,
    ) -> impl Future<Output = Result<Page<E>, SliceError>> + Send;

    /// Fetch one record by id.
    fn fetch_one(&self, id: E::Id) -> impl Future<Output = Result<E, SliceError>> + Send;

    /// Create a record. `entity` has no id; the returned record does.
    fn create(&self, entity: &E) -> impl Future<Output = Result<E, SliceError>> + Send;

    /// Replace the record with this id.
    fn update(&self, id: E::Id, entity: &E) -> impl Future<Output = Result<E, SliceError>> + Send;

    /// Change only the fields named by `patch`.
    fn patch(&self, patch: &Patch<E>) -> impl Future<Output = Result<E, SliceError>> + Send;

    /// Delete the record with this id.
    fn delete(&self, id: E::Id) -> impl Future<Output = Result<(), SliceError>> + Send;
}
