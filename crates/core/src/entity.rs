//! The entity contract shared by every slice.
//!
//! A slice is generic over one [`Entity`] type. Everything type-specific that
//! the slice and the REST backend need (display name, resource path, field
//! list) comes from the entity's static [`EntityDescriptor`], so a new entity
//! type is one struct plus one descriptor, not another copy of the slice.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// A record of a single business object type served by the persistence service.
pub trait Entity:
    Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Identifier type, assigned by the persistence service as a 64-bit integer.
    type Id: Copy
        + Eq
        + Hash
        + Debug
        + Display
        + FromStr
        + From<i64>
        + Into<i64>
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Static description of this entity type.
    const DESCRIPTOR: &'static EntityDescriptor;

    /// The identifier, or `None` for an entity that has not been created yet.
    fn id(&self) -> Option<Self::Id>;
}

/// Static description of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Display name, e.g. `StrapColor`.
    pub name: &'static str,
    /// Plural REST path segment under `/api`, e.g. `strap-colors`.
    pub path: &'static str,
    /// Updatable fields, excluding `id`.
    pub fields: &'static [FieldDescriptor],
}

impl EntityDescriptor {
    /// Look up a field by its wire name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Names of all required fields.
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name)
    }

    /// Resource path relative to the service root, e.g. `api/strap-colors`.
    #[must_use]
    pub fn resource_path(&self) -> String {
        format!("api/{}", self.path)
    }
}

/// One field of an entity as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// JSON field name.
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDescriptor {
    /// Describe an optional field.
    #[must_use]
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }

    /// Describe a required field.
    #[must_use]
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }
}

/// Wire type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Boolean,
    /// Id-only reference to another entity, `{"id": n}` on the wire.
    Reference,
}

/// A textual field value that does not fit the field's kind.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value {value:?} for {kind:?} field")]
pub struct FieldValueError {
    pub kind: FieldKind,
    pub value: String,
}

impl FieldKind {
    /// Convert a textual value (e.g. from a command line) to its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `FieldValueError` if the text does not parse as this kind.
    pub fn parse_value(self, raw: &str) -> Result<Value, FieldValueError> {
        let invalid = || FieldValueError {
            kind: self,
            value: raw.to_string(),
        };

        match self {
            Self::Text => Ok(Value::String(raw.to_string())),
            Self::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid()),
            Self::Decimal => Decimal::from_str(raw.trim())
                .map(|d| Value::String(d.to_string()))
                .map_err(|_| invalid()),
            Self::Boolean => raw
                .trim()
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|_| invalid()),
            Self::Reference => raw
                .trim()
                .parse::<i64>()
                .map(|id| serde_json::json!({ "id": id }))
                .map_err(|_| invalid()),
        }
    }
}
