//! Order Aggregate

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::cart::CartState;

/// A persisted cart. The cart's status field carries the order status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub cart: CartState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Returned }

impl Order {
    pub fn status(&self) -> OrderStatus { self.cart.status.unwrap_or_default() }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped,
        Self::Delivered, Self::Cancelled, Self::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Returned => "Returned",
        }
    }

    /// Customer-facing line shown under the status badge.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            Self::Pending => Some("We are preparing your order"),
            Self::Shipped => Some("Your order is on the way"),
            Self::Delivered => Some("Your order has been delivered"),
            Self::Cancelled => Some("Your order was cancelled"),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|status| status.as_str().eq_ignore_ascii_case(s)).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

pub const DEFAULT_ORDERS_PER_PAGE: u32 = 5;

/// Order history filter. Dates are whole UTC days; `to` includes its entire day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
}

impl Default for OrderQuery {
    fn default() -> Self { Self { status: None, from: None, to: None, page: 1, per_page: DEFAULT_ORDERS_PER_PAGE } }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: u32,
    pub total_pages: u32,
    pub total: usize,
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|status| order.status() != status) { return false; }
        if let Some(from) = self.from {
            if order.created_at < from.and_time(chrono::NaiveTime::MIN).and_utc() { return false; }
        }
        if let Some(end) = self.to.and_then(|to| to.checked_add_days(Days::new(1))) {
            if order.created_at >= end.and_time(chrono::NaiveTime::MIN).and_utc() { return false; }
        }
        true
    }

    /// Filters `orders` (kept in their given order) and cuts out the requested page.
    pub fn apply(&self, orders: &[Order]) -> OrderPage {
        let per_page = self.per_page.max(1);
        let page = self.page.max(1);
        let matching: Vec<&Order> = orders.iter().filter(|o| self.matches(o)).collect();
        let total = matching.len();
        let total_pages = u32::try_from(total.div_ceil(per_page as usize)).unwrap_or(u32::MAX);
        let skip = (page as usize - 1).saturating_mul(per_page as usize);
        let orders = matching.into_iter().skip(skip).take(per_page as usize).cloned().collect();
        OrderPage { orders, page, total_pages, total }
    }
}
