//! The entity store slice.
//!
//! An [`EntitySlice`] owns the cached [`SliceState`] of one entity type and
//! performs the fetch, create, update, delete and reset operations against an
//! [`EntityBackend`]. Every call goes through the same lifecycle: a start
//! transition applied before the request is issued, then exactly one settle
//! transition when the request resolves (or when the call is dropped).
//!
//! # Overlapping calls
//!
//! Calls may overlap and resolve in any order. Under
//! [`ConcurrencyPolicy::Fenced`] each call takes a ticket for the parts of the
//! state it may write:
//!
//! - *list*: `entities`, `total_items`, `links`
//! - *detail*: `entity`, shared by detail fetches and create/update
//! - *write*: `update_success` and the outcome of writes
//!
//! A result is applied only while its ticket is the newest one for that part.
//! [`EntitySlice::reset`] retires the detail and write tickets of calls still in
//! flight. Removing a deleted record from `entities` is always applied, and a
//! successful delete retires the list tickets of fetches still in flight so
//! a page read before the delete cannot bring the record back.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use slicekit_core::{Entity, Operation, SliceAction, SliceState};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::backend::{EntityBackend, Page};
use crate::client::{RestClient, RestResource};
use crate::error::SliceError;
use crate::patch::{Patch, unknown_field};
use crate::query::QueryParams;

/// How a slice treats results of calls that overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConcurrencyPolicy {
    /// Results of superseded calls are dropped.
    #[default]
    Fenced,
    /// Every result is applied; the last call to resolve wins.
    LastResolvedWins,
}

impl ConcurrencyPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fenced => "fenced",
            Self::LastResolvedWins => "last-resolved-wins",
        }
    }
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConcurrencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fenced" => Ok(Self::Fenced),
            "last-resolved-wins" => Ok(Self::LastResolvedWins),
            other => Err(format!(
                "unknown concurrency policy {other:?} (expected fenced or last-resolved-wins)"
            )),
        }
    }
}

/// Fenced parts of the slice state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    List,
    Detail,
    Write,
}

const ALL_SLOTS: [Slot; 3] = [Slot::List, Slot::Detail, Slot::Write];

/// One value per slot.
#[derive(Debug, Clone, Copy)]
struct PerSlot<T> {
    list: T,
    detail: T,
    write: T,
}

impl<T: Copy> PerSlot<T> {
    fn splat(value: T) -> Self {
        Self {
            list: value,
            detail: value,
            write: value,
        }
    }

    fn get(&self, slot: Slot) -> T {
        match slot {
            Slot::List => self.list,
            Slot::Detail => self.detail,
            Slot::Write => self.write,
        }
    }

    fn set(&mut self, slot: Slot, value: T) {
        match slot {
            Slot::List => self.list = value,
            Slot::Detail => self.detail = value,
            Slot::Write => self.write = value,
        }
    }
}

/// Latest ticket issued per slot.
#[derive(Debug, Default)]
struct Fences {
    list: AtomicU64,
    detail: AtomicU64,
    write: AtomicU64,
}

impl Fences {
    const fn counter(&self, slot: Slot) -> &AtomicU64 {
        match slot {
            Slot::List => &self.list,
            Slot::Detail => &self.detail,
            Slot::Write => &self.write,
        }
    }

    fn issue(&self, slot: Slot) -> u64 {
        self.counter(slot).fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current(&self, slot: Slot) -> u64 {
        self.counter(slot).load(Ordering::SeqCst)
    }
}

/// Cached state and operations for one entity type.
///
/// Cheap to clone; clones share state and backend.
pub struct EntitySlice<E: Entity, B> {
    inner: Arc<SliceInner<E, B>>,
}

struct SliceInner<E: Entity, B> {
    backend: B,
    state: watch::Sender<SliceState<E>>,
    policy: ConcurrencyPolicy,
    fences: Fences,
}

/// A slice backed by the REST persistence service.
pub type RestSlice<E> = EntitySlice<E, RestResource<E>>;

impl<E: Entity, B> Clone for EntitySlice<E, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Entity, B> fmt::Debug for EntitySlice<E, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("EntitySlice")
            .field("entity", &E::DESCRIPTOR.name)
            .field("policy", &self.inner.policy)
            .field("loading", &state.loading)
            .field("updating", &state.updating)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> EntitySlice<E, RestResource<E>> {
    /// A slice over this entity type's REST resource.
    #[must_use]
    pub fn from_client(client: &RestClient, policy: ConcurrencyPolicy) -> Self {
        Self::new(client.resource::<E>(), policy)
    }
}

impl<E: Entity, B: EntityBackend<E>> EntitySlice<E, B> {
    /// A slice with default state.
    #[must_use]
    pub fn new(backend: B, policy: ConcurrencyPolicy) -> Self {
        Self {
            inner: Arc::new(SliceInner {
                backend,
                state: watch::Sender::new(SliceState::default()),
                policy,
                fences: Fences::default(),
            }),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SliceState<E> {
        self.inner.state.borrow().clone()
    }

    /// A receiver that observes every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SliceState<E>> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn policy(&self) -> ConcurrencyPolicy {
        self.inner.policy
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Fetch a page of records into `entities`.
    ///
    /// # Errors
    ///
    /// Returns the backend error; it is also stored in `error_message`.
    #[instrument(skip(self), fields(entity_type = E::DESCRIPTOR.name))]
    pub async fn get_entities(&self, query: &QueryParams) -> Result<Page<E>, SliceError> {
        let call = self.begin(Operation::FetchList, &[Slot::List]);

        match self.inner.backend.fetch_page(query).await {
            Ok(page) => {
                debug!(count = page.items.len(), total_items = ?page.total_items, "Loaded list");
                call.settle(|settle| {
                    settle.apply_if_current(
                        Slot::List,
                        SliceAction::ListLoaded {
                            entities: page.items.clone(),
                            total_items: page.total_items,
                            links: page.links,
                        },
                    );
                });
                Ok(page)
            }
            Err(err) => Err(call.fail(Slot::List, err)),
        }
    }

    /// Fetch one record into `entity`.
    ///
    /// # Errors
    ///
    /// Returns the backend error; `entity` is left unchanged.
    #[instrument(skip(self), fields(entity_type = E::DESCRIPTOR.name, %id))]
    pub async fn get_entity(&self, id: E::Id) -> Result<E, SliceError> {
        let call = self.begin(Operation::FetchOne, &[Slot::Detail]);

        match self.inner.backend.fetch_one(id).await {
            Ok(entity) => {
                call.settle(|settle| {
                    settle.apply_if_current(Slot::Detail, SliceAction::EntityLoaded(entity.clone()));
                });
                Ok(entity)
            }
            Err(err) => Err(call.fail(Slot::Detail, err)),
        }
    }

    /// Create a record. `entity` must not have an id.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::InvalidRequest` without contacting the service if
    /// `entity` already has an id, otherwise the backend error.
    #[instrument(skip(self, entity), fields(entity_type = E::DESCRIPTOR.name))]
    pub async fn create_entity(&self, entity: &E) -> Result<E, SliceError> {
        let call = self.begin(Operation::Create, &[Slot::Detail, Slot::Write]);

        if let Some(id) = entity.id() {
            return Err(call.fail(
                Slot::Write,
                SliceError::InvalidRequest(format!(
                    "a new {} cannot already have an id ({id})",
                    E::DESCRIPTOR.name
                )),
            ));
        }

        let result = self.inner.backend.create(entity).await;
        call.written(result)
    }

    /// Replace a record with `entity`. `entity` must have an id.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::InvalidRequest` without contacting the service if
    /// `entity` has no id, otherwise the backend error.
    #[instrument(skip(self, entity), fields(entity_type = E::DESCRIPTOR.name, id = ?entity.id()))]
    pub async fn update_entity(&self, entity: &E) -> Result<E, SliceError> {
        let call = self.begin(Operation::Update, &[Slot::Detail, Slot::Write]);

        let Some(id) = entity.id() else {
            return Err(call.fail(
                Slot::Write,
                SliceError::InvalidRequest(format!(
                    "cannot update a {} without an id",
                    E::DESCRIPTOR.name
                )),
            ));
        };

        let result = self.inner.backend.update(id, entity).await;
        call.written(result)
    }

    /// Change only the fields named by `patch`.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::InvalidRequest` without contacting the service if
    /// the patch names a field the entity does not have, otherwise the backend
    /// error.
    #[instrument(skip(self, patch), fields(entity_type = E::DESCRIPTOR.name, id = %patch.id()))]
    pub async fn partial_update_entity(&self, patch: &Patch<E>) -> Result<E, SliceError> {
        let call = self.begin(Operation::PartialUpdate, &[Slot::Detail, Slot::Write]);

        if let Some(field) = patch.unknown_fields().next() {
            return Err(call.fail(Slot::Write, unknown_field::<E>(field)));
        }

        let result = self.inner.backend.patch(patch).await;
        call.written(result)
    }

    /// Delete a record and drop it from `entities`.
    ///
    /// # Errors
    ///
    /// Returns the backend error; it is also stored in `error_message`.
    #[instrument(skip(self), fields(entity_type = E::DESCRIPTOR.name, %id))]
    pub async fn delete_entity(&self, id: E::Id) -> Result<(), SliceError> {
        let call = self.begin(Operation::Delete, &[Slot::Write]);

        match self.inner.backend.delete(id).await {
            Ok(()) => {
                call.settle(|settle| {
                    settle.apply(SliceAction::EntityDeleted(id));
                    settle.retire(Slot::List);
                    settle.apply_if_current(Slot::Write, SliceAction::WriteSucceeded);
                });
                Ok(())
            }
            Err(err) => Err(call.fail(Slot::Write, err)),
        }
    }

    /// Clear `entity`, `update_success` and `error_message`.
    ///
    /// Detail and write results of calls still in flight are ignored once
    /// they resolve.
    pub fn reset(&self) {
        let inner = &self.inner;
        inner.state.send_modify(|state| {
            inner.fences.issue(Slot::Detail);
            inner.fences.issue(Slot::Write);
            state.apply(SliceAction::Reset);
        });
        debug!(entity_type = E::DESCRIPTOR.name, "Reset slice");
    }

    fn begin(&self, operation: Operation, slots: &[Slot]) -> Call<'_, E, B> {
        let inner = &*self.inner;
        let mut tickets = PerSlot::splat(None);
        inner.state.send_modify(|state| {
            for &slot in slots {
                tickets.set(slot, Some(inner.fences.issue(slot)));
            }
            state.apply(SliceAction::Started(operation));
        });
        debug!(operation = %operation, "Started");

        Call {
            inner,
            operation,
            tickets,
            settled: false,
        }
    }
}

/// One in-flight call. Settles the call on drop if it never resolved.
struct Call<'a, E: Entity, B> {
    inner: &'a SliceInner<E, B>,
    operation: Operation,
    tickets: PerSlot<Option<u64>>,
    settled: bool,
}

impl<E: Entity, B> Call<'_, E, B> {
    /// Apply the settle transition: the finish bookkeeping plus whatever
    /// `outcome` applies, as one state change.
    fn settle(mut self, outcome: impl FnOnce(&mut Settlement<'_, E>)) {
        self.settled = true;
        let inner = self.inner;
        let operation = self.operation;

        let tickets = self.tickets;
        inner.state.send_modify(|state| {
            let mut current = PerSlot::splat(true);
            if inner.policy == ConcurrencyPolicy::Fenced {
                for slot in ALL_SLOTS {
                    if let Some(ticket) = tickets.get(slot) {
                        current.set(slot, inner.fences.current(slot) == ticket);
                    }
                }
            }
            state.apply(SliceAction::Finished(operation));
            outcome(&mut Settlement {
                state,
                fences: &inner.fences,
                current,
                operation,
            });
        });
    }

    /// Settle a rejected call and hand the error back.
    fn fail(self, slot: Slot, err: SliceError) -> SliceError {
        warn!(operation = %self.operation, error = %err, "Request rejected");
        let message = err.to_string();
        self.settle(|settle| settle.apply_if_current(slot, SliceAction::Failed(message)));
        err
    }

    /// Settle a create or update with the service's answer.
    fn written(self, result: Result<E, SliceError>) -> Result<E, SliceError> {
        match result {
            Ok(saved) => {
                debug!(operation = %self.operation, id = ?saved.id(), "Saved");
                self.settle(|settle| {
                    settle.apply_if_current(Slot::Detail, SliceAction::EntityLoaded(saved.clone()));
                    settle.apply_if_current(Slot::Write, SliceAction::WriteSucceeded);
                });
                Ok(saved)
            }
            Err(err) => Err(self.fail(Slot::Write, err)),
        }
    }
}

impl<E: Entity, B> Drop for Call<'_, E, B> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!(operation = %self.operation, "Call dropped before it resolved");
        let operation = self.operation;
        self.inner
            .state
            .send_modify(|state| state.apply(SliceAction::Finished(operation)));
    }
}

/// The state as seen by a settling call.
struct Settlement<'a, E: Entity> {
    state: &'a mut SliceState<E>,
    fences: &'a Fences,
    current: PerSlot<bool>,
    operation: Operation,
}

impl<E: Entity> Settlement<'_, E> {
    fn apply(&mut self, action: SliceAction<E>) {
        self.state.apply(action);
    }

    /// Supersede every call holding a ticket for `slot`.
    fn retire(&self, slot: Slot) {
        self.fences.issue(slot);
    }

    fn apply_if_current(&mut self, slot: Slot, action: SliceAction<E>) {
        if self.current.get(slot) {
            self.state.apply(action);
        } else {
            debug!(operation = %self.operation, ?slot, "Dropped superseded result");
        }
    }
}
