//! Parsing of `field=value` command-line arguments.

use serde_json::{Map, Value};
use slicekit_core::{Entity, FieldValueError};
use thiserror::Error;

/// A command-line argument that does not describe a valid field value.
#[derive(Debug, Error)]
pub enum FieldArgError {
    #[error("expected FIELD=VALUE, got {0:?}")]
    Malformed(String),

    #[error("{entity} has no field {field:?}")]
    UnknownField { entity: &'static str, field: String },

    #[error("field {field}: {source}")]
    Value {
        field: String,
        source: FieldValueError,
    },

    #[error("{0}")]
    Sort(String),

    #[error("could not build {entity}: {source}")]
    Build {
        entity: &'static str,
        source: serde_json::Error,
    },
}

/// Turn `field=value` arguments into typed JSON fields of `E`.
///
/// # Errors
///
/// Returns `FieldArgError` for a malformed argument, an unknown field or a
/// value that does not fit the field's kind.
pub fn parse_assignments<E: Entity>(args: &[String]) -> Result<Map<String, Value>, FieldArgError> {
    let mut fields = Map::new();
    for arg in args {
        let (name, raw) = arg
            .split_once('=')
            .ok_or_else(|| FieldArgError::Malformed(arg.clone()))?;
        let name = name.trim();
        let field = E::DESCRIPTOR
            .field(name)
            .ok_or_else(|| FieldArgError::UnknownField {
                entity: E::DESCRIPTOR.name,
                field: name.to_string(),
            })?;

        let value = if raw.is_empty() {
            Value::Null
        } else {
            field
                .kind
                .parse_value(raw)
                .map_err(|source| FieldArgError::Value {
                    field: name.to_string(),
                    source,
                })?
        };
        fields.insert(field.name.to_string(), value);
    }
    Ok(fields)
}

/// Split a `field.operator=value` filter argument.
///
/// # Errors
///
/// Returns `FieldArgError::Malformed` if there is no `=` or no key.
pub fn parse_filter(arg: &str) -> Result<(String, String), FieldArgError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(FieldArgError::Malformed(arg.to_string())),
    }
}

/// A new entity with `fields` set and everything else at its default.
///
/// # Errors
///
/// Returns `FieldArgError::Build` if the fields do not fit the entity.
pub fn build_entity<E: Entity>(fields: &Map<String, Value>) -> Result<E, FieldArgError> {
    let build_error = |source| FieldArgError::Build {
        entity: E::DESCRIPTOR.name,
        source,
    };

    let mut json = serde_json::to_value(E::default()).map_err(build_error)?;
    if let Value::Object(map) = &mut json {
        map.extend(fields.clone());
    }
    serde_json::from_value(json).map_err(build_error)
}
