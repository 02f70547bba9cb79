//! Product description entity.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityDescriptor, FieldDescriptor, FieldKind};
use crate::types::DescriptionId;

/// A named block of descriptive text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DescriptionId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Entity for Description {
    type Id = DescriptionId;

    const DESCRIPTOR: &'static EntityDescriptor = &EntityDescriptor {
        name: "Description",
        path: "descriptions",
        fields: &[
            FieldDescriptor::required("name", FieldKind::Text),
            FieldDescriptor::optional("value", FieldKind::Text),
        ],
    };

    fn id(&self) -> Option<DescriptionId> {
        self.id
    }
}
