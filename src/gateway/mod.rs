//! Backend access: orders, catalog and storefront settings.
//!
//! The backend owns persistence and authentication. Everything here is a plain
//! request/response call; nothing is cached or retried.

pub mod postgres;

pub use postgres::PgGateway;

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::checkout::AppSettings;
use crate::domain::aggregates::{CartState, LineItem, Order, OrderStatus, UnknownStatus};
use crate::domain::value_objects::CheckoutData;
use crate::Product;

/// The user a request is made on behalf of, as established by the auth service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    user_id: Option<Uuid>,
}

impl Caller {
    pub fn anonymous() -> Self { Self { user_id: None } }
    pub fn authenticated(user_id: Uuid) -> Self { Self { user_id: Some(user_id) } }
    pub fn user_id(&self) -> Option<Uuid> { self.user_id }

    pub fn require_user(&self) -> Result<Uuid, GatewayError> { self.user_id.ok_or(GatewayError::Unauthenticated) }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("User not authenticated")]
    Unauthenticated,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("Malformed record: {0}")]
    Malformed(String),
}

impl From<UnknownStatus> for GatewayError {
    fn from(e: UnknownStatus) -> Self { Self::Malformed(e.to_string()) }
}

/// Partial order update. Unset fields are left as stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(rename = "cartitems", default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<LineItem>>,
    #[serde(rename = "totalquantity", default, skip_serializing_if = "Option::is_none")]
    pub total_quantity: Option<u32>,
    #[serde(rename = "totalprice", default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Decimal>,
    #[serde(rename = "checkoutdata", default, skip_serializing_if = "Option::is_none")]
    pub checkout_data: Option<CheckoutData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

impl OrderPatch {
    /// Everything an order edit can change: line items, totals and checkout data.
    pub fn from_cart(cart: &CartState) -> Self {
        Self {
            items: Some(cart.items.clone()),
            total_quantity: Some(cart.total_quantity),
            total_price: Some(cart.total_price),
            checkout_data: cart.checkout_data.clone(),
            status: None,
        }
    }

    pub fn status(status: OrderStatus) -> Self { Self { status: Some(status), ..Self::default() } }
}

#[automock]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Persists `cart` as a new order owned by the caller.
    async fn create(&self, caller: &Caller, cart: &CartState) -> Result<Order, GatewayError>;

    /// Applies `patch` to one of the caller's orders and returns the stored result.
    async fn update(&self, caller: &Caller, id: Uuid, patch: OrderPatch) -> Result<Order, GatewayError>;

    /// Moves one of the caller's orders to `Cancelled`.
    async fn cancel(&self, caller: &Caller, id: Uuid) -> Result<(), GatewayError>;

    /// The caller's orders, newest first. Anonymous callers have none.
    async fn list(&self, caller: &Caller) -> Result<Vec<Order>, GatewayError>;
}

#[automock]
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Published products with their images, descriptions, variants and options.
    async fn list_products(&self) -> Result<Vec<Product>, GatewayError>;

    async fn get_product(&self, id: i64) -> Result<Option<Product>, GatewayError>;

    /// Latest storefront settings document.
    async fn app_settings(&self) -> Result<AppSettings, GatewayError>;
}
