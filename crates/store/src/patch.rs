//! Partial updates.
//!
//! A [`Patch`] names one existing record and carries only the fields that
//! should change. It is sent as a JSON merge patch, so fields it does not
//! mention are left untouched by the service.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::{Map, Value};
use slicekit_core::Entity;

use crate::error::SliceError;

/// Media type of a partial update body.
pub const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// The fields to change on one existing record.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch<E: Entity> {
    id: E::Id,
    fields: Map<String, Value>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Patch<E> {
    /// An empty patch of the record with this id.
    #[must_use]
    pub fn new(id: E::Id) -> Self {
        Self {
            id,
            fields: Map::new(),
            _entity: PhantomData,
        }
    }

    /// A patch from raw JSON fields. Field names are checked when the patch
    /// is sent, not here.
    #[must_use]
    pub fn from_fields(id: E::Id, fields: Map<String, Value>) -> Self {
        Self {
            id,
            fields,
            _entity: PhantomData,
        }
    }

    /// Set one field.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::InvalidRequest` if the entity has no such field,
    /// and `SliceError::Decode` if the value does not serialize.
    pub fn set(mut self, field: &str, value: impl Serialize) -> Result<Self, SliceError> {
        if E::DESCRIPTOR.field(field).is_none() {
            return Err(unknown_field::<E>(field));
        }
        self.fields
            .insert(field.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// The fields that differ between `original` and `updated`.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::InvalidRequest` if `updated` has no id, or if the
    /// two records have different ids.
    pub fn diff(original: &E, updated: &E) -> Result<Self, SliceError> {
        let id = updated
            .id()
            .ok_or_else(|| SliceError::InvalidRequest(format!("{} has no id", E::DESCRIPTOR.name)))?;
        if original.id().is_some_and(|original_id| original_id != id) {
            return Err(SliceError::InvalidRequest(format!(
                "cannot diff {} {} against {}",
                E::DESCRIPTOR.name,
                id,
                original.id().map(|id| id.to_string()).unwrap_or_default(),
            )));
        }

        let before = as_object(original)?;
        let after = as_object(updated)?;

        let fields = after
            .into_iter()
            .filter(|(key, value)| key != "id" && before.get(key) != Some(value))
            .collect();

        Ok(Self::from_fields(id, fields))
    }

    /// Id of the patched record.
    #[must_use]
    pub const fn id(&self) -> E::Id {
        self.id
    }

    /// The fields this patch changes.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names that are not part of the entity.
    pub fn unknown_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|name| E::DESCRIPTOR.field(name).is_none())
    }

    /// Request body: the changed fields plus the id.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::Decode` if the id does not serialize.
    pub fn to_body(&self) -> Result<Value, SliceError> {
        let mut body = self.fields.clone();
        body.insert("id".to_string(), serde_json::to_value(self.id)?);
        Ok(Value::Object(body))
    }

    /// Apply this patch to a record with merge-patch semantics.
    ///
    /// # Errors
    ///
    /// Returns `SliceError::Decode` if the merged record no longer fits the entity.
    pub fn apply_to(&self, entity: &E) -> Result<E, SliceError> {
        let mut merged = as_object(entity)?;
        for (key, value) in &self.fields {
            merged.insert(key.clone(), value.clone());
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }
}

fn as_object<E: Entity>(entity: &E) -> Result<Map<String, Value>, SliceError> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        other => Err(SliceError::InvalidRequest(format!(
            "{} does not serialize to an object: {other}",
            E::DESCRIPTOR.name
        ))),
    }
}

pub(crate) fn unknown_field<E: Entity>(field: &str) -> SliceError {
    SliceError::InvalidRequest(format!("{} has no field {field:?}", E::DESCRIPTOR.name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use slicekit_core::entities::{OrderItem, StrapColor};
    use slicekit_core::{OrderItemId, StrapColorId};

    use super::*;

    fn saved_color() -> StrapColor {
        StrapColor {
            id: Some(StrapColorId::new(3)),
            ..StrapColor::new("Red").with_value("#ff0000")
        }
    }

    #[test]
    fn test_set_rejects_unknown_field() {
        let err = Patch::<StrapColor>::new(StrapColorId::new(3))
            .set("hue", "warm")
            .unwrap_err();
        assert!(matches!(err, SliceError::InvalidRequest(_)));
    }

    #[test]
    fn test_body_contains_only_changed_fields_and_id() {
        let patch = Patch::<StrapColor>::new(StrapColorId::new(3))
            .set("name", "Crimson")
            .unwrap();
        assert_eq!(
            patch.to_body().unwrap(),
            serde_json::json!({ "id": 3, "name": "Crimson" })
        );
    }

    #[test]
    fn test_diff_picks_changed_fields() {
        let original = saved_color();
        let updated = StrapColor {
            value: Some("#dc143c".to_string()),
            ..original.clone()
        };

        let patch = Patch::diff(&original, &updated).unwrap();
        assert_eq!(patch.id(), StrapColorId::new(3));
        assert_eq!(patch.fields().len(), 1);
        assert_eq!(patch.fields()["value"], "#dc143c");
    }

    #[test]
    fn test_diff_requires_matching_ids() {
        let original = saved_color();
        let other = StrapColor {
            id: Some(StrapColorId::new(4)),
            ..original.clone()
        };
        assert!(Patch::diff(&original, &other).is_err());
        assert!(Patch::diff(&original, &StrapColor::new("Red")).is_err());
    }

    #[test]
    fn test_apply_to_merges_fields() {
        let item = OrderItem {
            id: Some(OrderItemId::new(1)),
            quantity: 1,
            total_price: Decimal::new(500, 2),
            ..OrderItem::default()
        };
        let patch = Patch::<OrderItem>::new(OrderItemId::new(1))
            .set("quantity", 3)
            .unwrap();

        let merged = patch.apply_to(&item).unwrap();
        assert_eq!(merged.quantity, 3);
        assert_eq!(merged.total_price, Decimal::new(500, 2));
    }

    #[test]
    fn test_unknown_fields_from_raw_map() {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::from("Red"));
        fields.insert("shade".to_string(), Value::from("dark"));
        let patch = Patch::<StrapColor>::from_fields(StrapColorId::new(1), fields);
        assert_eq!(patch.unknown_fields().collect::<Vec<_>>(), vec!["shade"]);
    }
}
