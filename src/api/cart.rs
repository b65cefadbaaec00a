//! Cart and checkout handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::api::{ApiResult, AppState, CheckoutDataRequest, CommandResponse};
use crate::checkout::CheckoutForm;
use crate::domain::aggregates::{AddOutcome, Adjustment, CartState, LineItem, Order};
use crate::domain::value_objects::{CheckoutData, SelectedOptions};
use crate::gateway::Caller;
use crate::store::CartRoot;
use crate::SelectionError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: i64,
    /// Variant name to chosen option id.
    #[serde(default)]
    pub selected_option_ids: BTreeMap<String, i64>,
    #[validate(range(min = 1, max = 999))]
    pub quantity: u32,
}

/// Identifies a line item the way the cart serializes it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRef {
    pub product_id: i64,
    #[serde(default)]
    pub selected_options: SelectedOptions,
}

pub async fn get_cart(State(s): State<AppState>) -> Json<CartState> {
    Json(s.checkout.cart().lock().await.state().clone())
}

pub async fn add_item(
    State(s): State<AppState>,
    Json(r): Json<AddItemRequest>,
) -> ApiResult<(StatusCode, Json<CommandResponse<AddOutcome, CartState>>)> {
    r.validate()?;
    let product = s.catalog.get_product(r.product_id).await?.ok_or(SelectionError::ProductNotFound)?;
    let selected = product.select_options(&r.selected_option_ids)?;

    let mut cart = s.checkout.cart().lock().await;
    let outcome = cart.add(product, selected, r.quantity);
    let status = if outcome == AddOutcome::Appended { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(CommandResponse { outcome, cart: cart.state().clone() })))
}

pub async fn increase_item(State(s): State<AppState>, Json(r): Json<LineItemRef>) -> Json<CommandResponse<Adjustment, CartState>> {
    let mut cart = s.checkout.cart().lock().await;
    let outcome = cart.increase(r.product_id, &r.selected_options);
    Json(CommandResponse { outcome, cart: cart.state().clone() })
}

pub async fn decrease_item(State(s): State<AppState>, Json(r): Json<LineItemRef>) -> Json<CommandResponse<Adjustment, CartState>> {
    let mut cart = s.checkout.cart().lock().await;
    let outcome = cart.decrease(r.product_id, &r.selected_options);
    Json(CommandResponse { outcome, cart: cart.state().clone() })
}

pub async fn remove_item(State(s): State<AppState>, Json(r): Json<LineItemRef>) -> Json<CommandResponse<Option<LineItem>, CartState>> {
    let mut cart = s.checkout.cart().lock().await;
    let outcome = cart.remove(r.product_id, &r.selected_options);
    Json(CommandResponse { outcome, cart: cart.state().clone() })
}

pub async fn clear_cart(State(s): State<AppState>) -> Json<CartState> {
    let mut cart = s.checkout.cart().lock().await;
    cart.clear();
    Json(cart.state().clone())
}

pub async fn set_checkout_data(State(s): State<AppState>, Json(data): Json<CheckoutData>) -> Json<CartState> {
    let mut cart = s.checkout.cart().lock().await;
    cart.set_checkout_data(data);
    Json(cart.state().clone())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutFormResponse {
    pub form: CheckoutForm,
    pub initial_values: CheckoutData,
}

pub async fn checkout_form(State(s): State<AppState>) -> ApiResult<Json<CheckoutFormResponse>> {
    let form = s.checkout_form().await?;
    let initial_values = {
        let cart = s.checkout.cart().lock().await;
        form.initial_values(cart.state().checkout_data.as_ref())
    };
    Ok(Json(CheckoutFormResponse { form, initial_values }))
}

pub async fn checkout(
    State(s): State<AppState>,
    caller: Caller,
    Json(r): Json<CheckoutDataRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let form = s.checkout_form().await?;
    let data = match r.checkout_data {
        Some(data) => data,
        None => s.checkout.cart().lock().await.state().checkout_data.clone().unwrap_or_default(),
    };
    let order = s.checkout.place_order(&caller, &form, data).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
