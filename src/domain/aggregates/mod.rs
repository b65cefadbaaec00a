//! Aggregates module
pub mod cart;
pub mod order;

pub use cart::{AddOutcome, Adjustment, CartState, LineItem};
pub use order::{Order, OrderPage, OrderQuery, OrderStatus, UnknownStatus};
