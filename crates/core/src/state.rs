//! Slice state and the reducer that mutates it.
//!
//! [`SliceState`] is the cached client-side view of one entity type. It is only
//! ever changed through [`SliceState::apply`], one [`SliceAction`] at a time;
//! the async slice decides *which* actions to apply (and when), this module
//! decides *what* each action does to the state.

use crate::entity::Entity;

/// The operations a slice can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchList,
    FetchOne,
    Create,
    Update,
    PartialUpdate,
    Delete,
}

impl Operation {
    /// Whether this operation writes to the persistence service.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update | Self::PartialUpdate | Self::Delete
        )
    }

    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FetchList => "fetch_list",
            Self::FetchOne => "fetch_one",
            Self::Create => "create",
            Self::Update => "update",
            Self::PartialUpdate => "partial_update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page numbers advertised by the `Link` header of a list response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub first: Option<u32>,
    pub prev: Option<u32>,
    pub next: Option<u32>,
    pub last: Option<u32>,
}

impl PageLinks {
    /// Whether the service advertised a next page.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Cached state for one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceState<E: Entity> {
    /// Result of the last list fetch, in service order.
    pub entities: Vec<E>,
    /// Result of the last detail fetch or confirmed write, or a blank entity.
    pub entity: E,
    /// A read request is in flight.
    pub loading: bool,
    /// A create, update or delete request is in flight.
    pub updating: bool,
    /// A write completed successfully and no request has started since.
    pub update_success: bool,
    pub error_message: Option<String>,
    /// Total record count reported by the last list fetch.
    pub total_items: Option<u64>,
    pub links: PageLinks,
    pending_reads: usize,
    pending_writes: usize,
}

impl<E: Entity> Default for SliceState<E> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            entity: E::default(),
            loading: false,
            updating: false,
            update_success: false,
            error_message: None,
            total_items: None,
            links: PageLinks::default(),
            pending_reads: 0,
            pending_writes: 0,
        }
    }
}

/// A single state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceAction<E: Entity> {
    /// A call of this operation has started.
    Started(Operation),
    /// A call of this operation has settled, whatever its outcome.
    Finished(Operation),
    /// A list fetch succeeded.
    ListLoaded {
        entities: Vec<E>,
        total_items: Option<u64>,
        links: PageLinks,
    },
    /// A detail fetch or write returned this record.
    EntityLoaded(E),
    /// A write succeeded.
    WriteSucceeded,
    /// The record with this id was deleted.
    EntityDeleted(E::Id),
    /// A call failed with this message.
    Failed(String),
    Reset,
}

impl<E: Entity> SliceState<E> {
    /// Number of read calls currently in flight.
    #[must_use]
    pub const fn pending_reads(&self) -> usize {
        self.pending_reads
    }

    /// Number of write calls currently in flight.
    #[must_use]
    pub const fn pending_writes(&self) -> usize {
        self.pending_writes
    }

    /// Whether no call of any kind is in flight.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.pending_reads == 0 && self.pending_writes == 0
    }

    /// Apply one action.
    pub fn apply(&mut self, action: SliceAction<E>) {
        match action {
            SliceAction::Started(operation) => {
                self.error_message = None;
                self.update_success = false;
                if operation.is_write() {
                    self.pending_writes += 1;
                } else {
                    self.pending_reads += 1;
                }
            }
            SliceAction::Finished(operation) => {
                if operation.is_write() {
                    self.pending_writes = self.pending_writes.saturating_sub(1);
                } else {
                    self.pending_reads = self.pending_reads.saturating_sub(1);
                }
            }
            SliceAction::ListLoaded {
                entities,
                total_items,
                links,
            } => {
                self.entities = entities;
                self.total_items = total_items;
                self.links = links;
            }
            SliceAction::EntityLoaded(entity) => self.entity = entity,
            SliceAction::WriteSucceeded => self.update_success = true,
            SliceAction::EntityDeleted(id) => {
                self.entities.retain(|entity| entity.id() != Some(id));
                if let Some(total) = self.total_items.as_mut() {
                    *total = total.saturating_sub(1);
                }
            }
            SliceAction::Failed(message) => self.error_message = Some(message),
            SliceAction::Reset => {
                self.entity = E::default();
                self.update_success = false;
                self.error_message = None;
            }
        }

        self.loading = self.pending_reads > 0;
        self.updating = self.pending_writes > 0;
    }

    /// Apply a batch of actions as one transition.
    pub fn apply_all(&mut self, actions: impl IntoIterator<Item = SliceAction<E>>) {
        for action in actions {
            self.apply(action);
        }
    }
}
