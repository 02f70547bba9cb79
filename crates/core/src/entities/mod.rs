//! Sample entity types.
//!
//! These are the entity types the CLI knows by name and the integration tests
//! serve. Each one is a plain serde struct plus an [`Entity`](crate::Entity)
//! impl pointing at its descriptor.

pub mod customer;
pub mod description;
pub mod order_item;
pub mod strap_color;

pub use customer::Customer;
pub use description::Description;
pub use order_item::OrderItem;
pub use strap_color::StrapColor;
