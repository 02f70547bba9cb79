//! Strap colour entity.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityDescriptor, FieldDescriptor, FieldKind};
use crate::types::StrapColorId;

/// A named strap colour with an optional colour value (e.g. a hex code).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrapColor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StrapColorId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl StrapColor {
    /// A not-yet-created strap colour.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            value: None,
        }
    }

    /// Set the colour value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl Entity for StrapColor {
    type Id = StrapColorId;

    const DESCRIPTOR: &'static EntityDescriptor = &EntityDescriptor {
        name: "StrapColor",
        path: "strap-colors",
        fields: &[
            FieldDescriptor::required("name", FieldKind::Text),
            FieldDescriptor::optional("value", FieldKind::Text),
        ],
    };

    fn id(&self) -> Option<StrapColorId> {
        self.id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_strap_color_serializes_without_id() {
        let color = StrapColor::new("Red").with_value("#ff0000");
        let json = serde_json::to_value(&color).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Red", "value": "#ff0000" }));
    }

    #[test]
    fn test_default_is_blank() {
        let blank = StrapColor::default();
        assert!(blank.id().is_none());
        assert!(blank.name.is_empty());
        assert!(blank.value.is_none());
    }
}
