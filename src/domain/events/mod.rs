//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::Order;

/// Raised once the backend has accepted an order change.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, total_quantity: u32, total_price: Decimal, email: Option<String> },
    Updated { order_id: Uuid, total_quantity: u32, total_price: Decimal, email: Option<String> },
    Cancelled { order_id: Uuid },
}

impl OrderEvent {
    pub fn created(order: &Order) -> Self {
        Self::Created {
            order_id: order.id,
            total_quantity: order.cart.total_quantity,
            total_price: order.cart.total_price,
            email: contact_email(order),
        }
    }

    pub fn updated(order: &Order) -> Self {
        Self::Updated {
            order_id: order.id,
            total_quantity: order.cart.total_quantity,
            total_price: order.cart.total_price,
            email: contact_email(order),
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Created { order_id, .. } | Self::Updated { order_id, .. } | Self::Cancelled { order_id } => *order_id,
        }
    }

    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Created { .. } => "storefront.orders.created",
            Self::Updated { .. } => "storefront.orders.updated",
            Self::Cancelled { .. } => "storefront.orders.cancelled",
        }
    }
}

fn contact_email(order: &Order) -> Option<String> {
    order.cart.checkout_data.as_ref().and_then(|data| data.text("email")).filter(|e| !e.is_empty())
}
