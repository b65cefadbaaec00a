//! Storefront domain: catalog selections, pricing, carts and orders.
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod value_objects;
