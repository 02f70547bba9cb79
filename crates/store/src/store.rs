//! The application store: one slice per registered entity type.
//!
//! A [`Store`] is built once per application session and handed to whatever
//! needs slices. There is no global registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use slicekit_core::Entity;
use tracing::warn;

use crate::backend::EntityBackend;
use crate::client::{RestClient, RestResource};
use crate::slice::{ConcurrencyPolicy, EntitySlice, RestSlice};

type SliceMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Slices of every registered entity type.
///
/// Cheap to clone; clones share the same slices.
#[derive(Clone, Default)]
pub struct Store {
    slices: Arc<SliceMap>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("slices", &self.slices.len())
            .finish()
    }
}

impl Store {
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// The slice registered for entity type `E` with backend `B`.
    #[must_use]
    pub fn slice<E: Entity, B: EntityBackend<E>>(&self) -> Option<EntitySlice<E, B>> {
        self.slices
            .get(&TypeId::of::<EntitySlice<E, B>>())
            .and_then(|slice| slice.downcast_ref::<EntitySlice<E, B>>())
            .cloned()
    }

    /// The REST slice registered for entity type `E`.
    #[must_use]
    pub fn rest<E: Entity>(&self) -> Option<RestSlice<E>> {
        self.slice::<E, RestResource<E>>()
    }

    /// Number of registered slices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Collects slices before the store is shared.
#[derive(Default)]
pub struct StoreBuilder {
    slices: SliceMap,
}

impl StoreBuilder {
    /// Register a slice. A later registration for the same entity type and
    /// backend replaces the earlier one.
    #[must_use]
    pub fn register<E: Entity, B: EntityBackend<E>>(mut self, slice: EntitySlice<E, B>) -> Self {
        if self
            .slices
            .insert(TypeId::of::<EntitySlice<E, B>>(), Box::new(slice))
            .is_some()
        {
            warn!(entity_type = E::DESCRIPTOR.name, "Replaced registered slice");
        }
        self
    }

    /// Register a REST slice for entity type `E`.
    #[must_use]
    pub fn rest<E: Entity>(self, client: &RestClient, policy: ConcurrencyPolicy) -> Self {
        self.register(RestSlice::<E>::from_client(client, policy))
    }

    #[must_use]
    pub fn build(self) -> Store {
        Store {
            slices: Arc::new(self.slices),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use slicekit_core::entities::{Customer, StrapColor};
    use url::Url;

    use super::*;
    use crate::config::ClientConfig;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn test_slices_are_isolated_per_entity_type() {
        let store = Store::builder()
            .register(EntitySlice::new(
                MemoryBackend::<StrapColor>::new(),
                ConcurrencyPolicy::Fenced,
            ))
            .register(EntitySlice::new(
                MemoryBackend::<Customer>::new(),
                ConcurrencyPolicy::Fenced,
            ))
            .build();
        assert_eq!(store.len(), 2);

        let colors = store
            .slice::<StrapColor, MemoryBackend<StrapColor>>()
            .unwrap();
        colors.create_entity(&StrapColor::new("Red")).await.unwrap();

        // Lookups hand out the shared slice, not a copy.
        let again = store
            .slice::<StrapColor, MemoryBackend<StrapColor>>()
            .unwrap();
        assert!(again.state().update_success);

        let customers = store.slice::<Customer, MemoryBackend<Customer>>().unwrap();
        assert!(!customers.state().update_success);
        assert_eq!(customers.state().entity, Customer::default());
    }

    #[test]
    fn test_missing_slice_is_none() {
        let store = Store::builder().build();
        assert!(store.is_empty());
        assert!(store.rest::<StrapColor>().is_none());
    }

    #[test]
    fn test_rest_registration() {
        let client =
            RestClient::new(&ClientConfig::new(Url::parse("http://localhost:8080").unwrap()))
                .unwrap();
        let store = Store::builder()
            .rest::<StrapColor>(&client, ConcurrencyPolicy::LastResolvedWins)
            .build();

        let slice = store.rest::<StrapColor>().unwrap();
        assert_eq!(slice.policy(), ConcurrencyPolicy::LastResolvedWins);
        assert!(store.rest::<Customer>().is_none());
    }
}
