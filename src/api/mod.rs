//! HTTP surface for the storefront.
//!
//! The server fronts a single shopper session: one cart and one order view,
//! owned by the [`CheckoutService`]. The backend identifies the shopper
//! through the `x-user-id` header set by the auth proxy.

pub mod cart;
pub mod error;
pub mod orders;

pub use error::{ApiError, ApiResult};

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::checkout::{CheckoutForm, CheckoutService};
use crate::domain::value_objects::{CheckoutData, SelectedOptions};
use crate::gateway::{Caller, CatalogGateway};
use crate::{Product, SelectionError};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub catalog: Arc<dyn CatalogGateway>,
    pub orders_per_page: u32,
}

impl AppState {
    async fn checkout_form(&self) -> ApiResult<CheckoutForm> { Ok(self.catalog.app_settings().await?.checkout_form()) }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-storefront"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/items", post(cart::add_item))
        .route("/api/v1/cart/items/increase", post(cart::increase_item))
        .route("/api/v1/cart/items/decrease", post(cart::decrease_item))
        .route("/api/v1/cart/items/remove", post(cart::remove_item))
        .route("/api/v1/cart/checkout-data", put(cart::set_checkout_data))
        .route("/api/v1/checkout", post(cart::checkout))
        .route("/api/v1/checkout/form", get(cart::checkout_form))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/current", get(orders::current_order).delete(orders::close_order))
        .route("/api/v1/orders/current/items", delete(orders::clear_items))
        .route("/api/v1/orders/current/items/increase", post(orders::increase_item))
        .route("/api/v1/orders/current/items/decrease", post(orders::decrease_item))
        .route("/api/v1/orders/current/items/remove", post(orders::remove_item))
        .route("/api/v1/orders/current/checkout-data", put(orders::set_checkout_data))
        .route("/api/v1/orders/current/submit", post(orders::submit_edit))
        .route("/api/v1/orders/:id/view", post(orders::view_order))
        .route("/api/v1/orders/:id/cancel", post(orders::cancel_order))
        .with_state(state)
}

async fn list_products(State(s): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(s.catalog.list_products().await?))
}

/// A product page: the product and the options preselected for it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub product: Product,
    pub default_selection: SelectedOptions,
}

async fn get_product(State(s): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<ProductPage>> {
    let product = s.catalog.get_product(id).await?.ok_or(SelectionError::ProductNotFound)?;
    let default_selection = product.default_selection();
    Ok(Json(ProductPage { product, default_selection }))
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(USER_ID_HEADER) else { return Ok(Caller::anonymous()) };
        raw.to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Caller::authenticated)
            .ok_or_else(|| ApiError::BadRequest(format!("{USER_ID_HEADER} must be a UUID")))
    }
}

/// Result of a store command together with the cart it left behind.
#[derive(Debug, Serialize)]
pub struct CommandResponse<T, C> {
    pub outcome: T,
    pub cart: C,
}

/// Body of checkout-data updates and submissions.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDataRequest {
    #[serde(default)]
    pub checkout_data: Option<CheckoutData>,
}
