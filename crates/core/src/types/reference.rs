//! Id-only back-references between entities.

use serde::{Deserialize, Serialize};

/// A weak reference to another entity by identifier.
///
/// Serialised as `{"id": <id>}`, matching how the persistence service embeds
/// related records. Any extra fields the service sends alongside the id are
/// ignored: the referencing entity never owns the referenced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference<Id> {
    pub id: Id,
}

impl<Id> Reference<Id> {
    /// Reference the entity with the given id.
    #[must_use]
    pub const fn to(id: Id) -> Self {
        Self { id }
    }
}

impl<Id> From<Id> for Reference<Id> {
    fn from(id: Id) -> Self {
        Self { id }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::OrderId;

    #[test]
    fn test_reference_wire_shape() {
        let reference = Reference::to(OrderId::new(3));
        assert_eq!(serde_json::to_string(&reference).unwrap(), r#"{"id":3}"#);
    }

    #[test]
    fn test_reference_ignores_embedded_fields() {
        let reference: Reference<OrderId> =
            serde_json::from_str(r#"{"id":3,"status":"PAID","total":"10.00"}"#).unwrap();
        assert_eq!(reference.id, OrderId::new(3));
    }
}
