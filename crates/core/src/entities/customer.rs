//! Customer entity.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityDescriptor, FieldDescriptor, FieldKind};
use crate::types::CustomerId;

/// A customer and their delivery details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CustomerId>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
}

impl Entity for Customer {
    type Id = CustomerId;

    const DESCRIPTOR: &'static EntityDescriptor = &EntityDescriptor {
        name: "Customer",
        path: "customers",
        fields: &[
            FieldDescriptor::optional("firstName", FieldKind::Text),
            FieldDescriptor::optional("lastName", FieldKind::Text),
            FieldDescriptor::optional("phoneNumber", FieldKind::Text),
            FieldDescriptor::optional("emailAddress", FieldKind::Text),
            FieldDescriptor::optional("deliveryAddress", FieldKind::Text),
        ],
    };

    fn id(&self) -> Option<CustomerId> {
        self.id
    }
}
