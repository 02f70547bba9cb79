//! In-process persistence backend.
//!
//! [`MemoryBackend`] keeps records in memory and follows the same rules as the
//! REST service: ids are assigned on create, a new record may not carry an id,
//! updates must name an existing record, required fields must be present, and
//! a list request without a size gets a page of [`DEFAULT_PAGE_SIZE`] records.
//! It backs the slice tests and the integration-test service.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering as AtomicOrdering};

use serde_json::Value;
use slicekit_core::{Entity, FieldKind};
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::{EntityBackend, Page};
use crate::error::{FieldError, SliceError};
use crate::pagination::{DEFAULT_PAGE_SIZE, page_links};
use crate::patch::{Patch, unknown_field};
use crate::query::{Direction, QueryParams};

/// Records of one entity type held in memory.
///
/// Clones share the same records.
pub struct MemoryBackend<E: Entity> {
    inner: Arc<MemoryInner<E>>,
}

struct MemoryInner<E: Entity> {
    records: Mutex<BTreeMap<i64, E>>,
    next_id: AtomicI64,
    requests: AtomicUsize,
}

impl<E: Entity> Clone for MemoryBackend<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Entity> Default for MemoryBackend<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> std::fmt::Debug for MemoryBackend<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entity", &E::DESCRIPTOR.name)
            .field("requests", &self.requests())
            .finish_non_exhaustive()
    }
}

impl<E: Entity> MemoryBackend<E> {
    /// An empty backend. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                records: Mutex::new(BTreeMap::new()),
                next_id: AtomicI64::new(1),
                requests: AtomicUsize::new(0),
            }),
        }
    }

    /// A backend preloaded with saved records. Records without an id are skipped.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = E>) -> Self {
        let records: BTreeMap<i64, E> = records
            .into_iter()
            .filter_map(|record| record.id().map(|id| (key::<E>(id), record)))
            .collect();
        let next_id = records.keys().next_back().map_or(1, |max| max + 1);

        Self {
            inner: Arc::new(MemoryInner {
                records: Mutex::new(records),
                next_id: AtomicI64::new(next_id),
                requests: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of backend operations served so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.inner.requests.load(AtomicOrdering::SeqCst)
    }

    /// All stored records in id order.
    pub async fn records(&self) -> Vec<E> {
        self.inner.records.lock().await.values().cloned().collect()
    }

    fn count_request(&self) {
        self.inner.requests.fetch_add(1, AtomicOrdering::SeqCst);
    }

    fn not_found(id: impl std::fmt::Display) -> SliceError {
        SliceError::NotFound(format!("{} {id} not found", E::DESCRIPTOR.name))
    }
}

impl<E: Entity> EntityBackend<E> for MemoryBackend<E> {
    async fn fetch_page(&self, query: &QueryParams) -> Result<Page<E>, SliceError> {
        self.count_request();
        let records = self.inner.records.lock().await;

        let mut matching = Vec::new();
        for record in records.values() {
            let json = serde_json::to_value(record)?;
            if query
                .filters
                .iter()
                .all(|(key, expected)| matches_filter(&json, key, expected))
            {
                matching.push((json, record.clone()));
            }
        }
        drop(records);

        for sort in query.sort.iter().rev() {
            matching.sort_by(|(a, _), (b, _)| {
                let ordering = compare_values(&a[sort.field.as_str()], &b[sort.field.as_str()]);
                match sort.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        let total = matching.len() as u64;
        let items: Vec<E> = matching.into_iter().map(|(_, record)| record).collect();

        let page = query.page.unwrap_or(0);
        let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let start = usize::try_from(u64::from(page) * u64::from(size)).unwrap_or(usize::MAX);
        let items = items
            .into_iter()
            .skip(start)
            .take(usize::try_from(size).unwrap_or(usize::MAX))
            .collect();

        Ok(Page {
            items,
            total_items: Some(total),
            links: page_links(page, size, total),
        })
    }

    async fn fetch_one(&self, id: E::Id) -> Result<E, SliceError> {
        self.count_request();
        self.inner
            .records
            .lock()
            .await
            .get(&key::<E>(id))
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn create(&self, entity: &E) -> Result<E, SliceError> {
        self.count_request();
        if entity.id().is_some() {
            return Err(SliceError::ValidationFailed {
                message: format!("A new {} cannot already have an ID", E::DESCRIPTOR.name),
                field_errors: Vec::new(),
            });
        }
        validate(entity)?;

        let id = self.inner.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        let saved = with_id(entity, id)?;
        self.inner.records.lock().await.insert(id, saved.clone());
        debug!(entity_type = E::DESCRIPTOR.name, id, "Stored new record");
        Ok(saved)
    }

    async fn update(&self, id: E::Id, entity: &E) -> Result<E, SliceError> {
        self.count_request();
        let Some(body_id) = entity.id() else {
            return Err(invalid("Invalid id"));
        };
        if body_id != id {
            return Err(invalid("Invalid ID"));
        }
        validate(entity)?;

        let mut records = self.inner.records.lock().await;
        let Some(record) = records.get_mut(&key::<E>(id)) else {
            return Err(SliceError::Conflict("Entity not found".to_string()));
        };
        *record = entity.clone();
        Ok(entity.clone())
    }

    async fn patch(&self, patch: &Patch<E>) -> Result<E, SliceError> {
        self.count_request();
        if let Some(field) = patch.unknown_fields().next() {
            return Err(unknown_field::<E>(field));
        }

        let mut records = self.inner.records.lock().await;
        let Some(record) = records.get_mut(&key::<E>(patch.id())) else {
            return Err(Self::not_found(patch.id()));
        };
        let merged = patch.apply_to(record)?;
        validate(&merged)?;
        *record = merged.clone();
        Ok(merged)
    }

    async fn delete(&self, id: E::Id) -> Result<(), SliceError> {
        self.count_request();
        self.inner.records.lock().await.remove(&key::<E>(id));
        Ok(())
    }
}

fn key<E: Entity>(id: E::Id) -> i64 {
    id.into()
}

fn invalid(message: &str) -> SliceError {
    SliceError::ValidationFailed {
        message: message.to_string(),
        field_errors: Vec::new(),
    }
}

/// Reject records whose required fields are null or blank.
fn validate<E: Entity>(entity: &E) -> Result<(), SliceError> {
    let json = serde_json::to_value(entity)?;
    let field_errors: Vec<FieldError> = E::DESCRIPTOR
        .fields
        .iter()
        .filter(|field| field.required)
        .filter(|field| match &json[field.name] {
            Value::Null => true,
            Value::String(text) => field.kind == FieldKind::Text && text.trim().is_empty(),
            _ => false,
        })
        .map(|field| FieldError {
            object_name: E::DESCRIPTOR.name.to_string(),
            field: field.name.to_string(),
            message: "must not be blank".to_string(),
        })
        .collect();

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(SliceError::ValidationFailed {
            message: format!("{} failed validation", E::DESCRIPTOR.name),
            field_errors,
        })
    }
}

fn with_id<E: Entity>(entity: &E, id: i64) -> Result<E, SliceError> {
    let mut json = serde_json::to_value(entity)?;
    if let Value::Object(map) = &mut json {
        map.insert("id".to_string(), Value::from(id));
    }
    Ok(serde_json::from_value(json)?)
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(map) => map.get("id").map(as_text).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Match one `field.operator=value` filter. A bare field name means `equals`.
fn matches_filter(json: &Value, key: &str, expected: &str) -> bool {
    let (field, operator) = key.split_once('.').unwrap_or((key, "equals"));
    let actual = &json[field];
    match operator {
        "equals" => !actual.is_null() && as_text(actual) == expected,
        "notEquals" => as_text(actual) != expected,
        "contains" => as_text(actual).contains(expected),
        "specified" => actual.is_null() != (expected == "true"),
        "in" => expected.split(',').any(|candidate| as_text(actual) == candidate),
        _ => true,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => {
            let (a, b) = (as_text(a), as_text(b));
            match (a.parse::<f64>(), b.parse::<f64>()) {
                (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => a.cmp(&b),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use slicekit_core::entities::{OrderItem, StrapColor};
    use slicekit_core::{OrderItemId, StrapColorId};

    use super::*;
    use crate::query::Sort;

    fn color(id: i64, name: &str) -> StrapColor {
        StrapColor {
            id: Some(StrapColorId::new(id)),
            ..StrapColor::new(name)
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let backend = MemoryBackend::<StrapColor>::new();
        let red = backend.create(&StrapColor::new("Red")).await.unwrap();
        let blue = backend.create(&StrapColor::new("Blue")).await.unwrap();
        assert_eq!(red.id, Some(StrapColorId::new(1)));
        assert_eq!(blue.id, Some(StrapColorId::new(2)));
        assert_eq!(backend.requests(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_existing_id_and_blank_required_fields() {
        let backend = MemoryBackend::<StrapColor>::new();
        let err = backend.create(&color(5, "Red")).await.unwrap_err();
        assert!(matches!(err, SliceError::ValidationFailed { .. }));

        let err = backend.create(&StrapColor::new("  ")).await.unwrap_err();
        match err {
            SliceError::ValidationFailed { field_errors, .. } => {
                assert_eq!(field_errors.len(), 1);
                assert_eq!(field_errors[0].field, "name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(backend.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_preloaded_records_continue_id_sequence() {
        let backend = MemoryBackend::with_records([color(4, "Blue"), color(9, "Green")]);
        let created = backend.create(&StrapColor::new("Red")).await.unwrap();
        assert_eq!(created.id, Some(StrapColorId::new(10)));
    }

    #[tokio::test]
    async fn test_update_rules() {
        let backend = MemoryBackend::with_records([color(1, "Red")]);

        let err = backend
            .update(StrapColorId::new(1), &StrapColor::new("Red"))
            .await
            .unwrap_err();
        assert!(matches!(err, SliceError::ValidationFailed { ref message, .. } if message == "Invalid id"));

        let err = backend
            .update(StrapColorId::new(2), &color(1, "Red"))
            .await
            .unwrap_err();
        assert!(matches!(err, SliceError::ValidationFailed { ref message, .. } if message == "Invalid ID"));

        let err = backend
            .update(StrapColorId::new(7), &color(7, "Gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, SliceError::Conflict(_)));

        let saved = backend
            .update(StrapColorId::new(1), &color(1, "Crimson"))
            .await
            .unwrap();
        assert_eq!(saved.name, "Crimson");
        assert_eq!(backend.records().await, vec![color(1, "Crimson")]);
    }

    #[tokio::test]
    async fn test_patch_merges_and_validates() {
        let backend = MemoryBackend::with_records([OrderItem {
            id: Some(OrderItemId::new(1)),
            quantity: 1,
            total_price: Decimal::new(1000, 2),
            ..OrderItem::default()
        }]);

        let patch = Patch::<OrderItem>::new(OrderItemId::new(1))
            .set("quantity", 4)
            .unwrap();
        let saved = backend.patch(&patch).await.unwrap();
        assert_eq!(saved.quantity, 4);
        assert_eq!(saved.total_price, Decimal::new(1000, 2));

        let missing = Patch::<OrderItem>::new(OrderItemId::new(2));
        assert!(matches!(
            backend.patch(&missing).await.unwrap_err(),
            SliceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_page_filters_sorts_and_pages() {
        let backend = MemoryBackend::with_records([
            color(1, "Red"),
            color(2, "Blue"),
            color(3, "Green"),
            color(4, "Dark Red"),
        ]);

        let page = backend
            .fetch_page(&QueryParams::new().filter("name.contains", "Red").sort(Sort::desc("name")))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Red", "Dark Red"]);
        assert_eq!(page.total_items, Some(2));

        let page = backend
            .fetch_page(&QueryParams::new().page(1).size(3).sort(Sort::asc("id")))
            .await
            .unwrap();
        assert_eq!(page.items, vec![color(4, "Dark Red")]);
        assert_eq!(page.total_items, Some(4));
        assert_eq!(page.links.prev, Some(0));
        assert_eq!(page.links.next, None);
    }

    #[tokio::test]
    async fn test_fetch_page_defaults_to_twenty_records() {
        let backend = MemoryBackend::with_records((1..=25).map(|id| color(id, "Grey")));

        let page = backend.fetch_page(&QueryParams::new()).await.unwrap();

        assert_eq!(page.items.len(), 20);
        assert_eq!(page.total_items, Some(25));
        assert_eq!(page.links.next, Some(1));
        assert_eq!(page.links.last, Some(1));
    }

    #[tokio::test]
    async fn test_fetch_missing_and_delete_is_idempotent() {
        let backend = MemoryBackend::with_records([color(1, "Red")]);
        assert!(matches!(
            backend.fetch_one(StrapColorId::new(999)).await.unwrap_err(),
            SliceError::NotFound(_)
        ));

        backend.delete(StrapColorId::new(1)).await.unwrap();
        backend.delete(StrapColorId::new(1)).await.unwrap();
        assert!(backend.records().await.is_empty());
    }

    #[test]
    fn test_compare_values_numeric_strings() {
        assert_eq!(
            compare_values(&Value::from("9.50"), &Value::from("10.00")),
            Ordering::Less
        );
        assert_eq!(compare_values(&Value::Null, &Value::from(1)), Ordering::Less);
    }
}
