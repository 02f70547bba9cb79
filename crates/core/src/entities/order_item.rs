//! Order line item entity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityDescriptor, FieldDescriptor, FieldKind};
use crate::types::{OrderId, OrderItemId, ProductDetailsId, Reference};

/// One line of an order: a quantity of a product at a total price.
///
/// The order and the product details are referenced by id only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderItemId>,
    #[serde(default)]
    pub quantity: i32,
    /// Written as a string; read from a string or a JSON number.
    #[serde(default)]
    pub total_price: Decimal,
    #[serde(default)]
    pub order: Option<Reference<OrderId>>,
    #[serde(default)]
    pub product_details: Option<Reference<ProductDetailsId>>,
}

impl Entity for OrderItem {
    type Id = OrderItemId;

    const DESCRIPTOR: &'static EntityDescriptor = &EntityDescriptor {
        name: "OrderItem",
        path: "order-items",
        fields: &[
            FieldDescriptor::required("quantity", FieldKind::Integer),
            FieldDescriptor::required("totalPrice", FieldKind::Decimal),
            FieldDescriptor::optional("order", FieldKind::Reference),
            FieldDescriptor::optional("productDetails", FieldKind::Reference),
        ],
    };

    fn id(&self) -> Option<OrderItemId> {
        self.id
    }
}
