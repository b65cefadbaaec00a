//! Order history, order detail editing and cancellation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::cart::LineItemRef;
use crate::api::{ApiError, ApiResult, AppState, CheckoutDataRequest, CommandResponse};
use crate::checkout::CheckoutError;
use crate::domain::aggregates::{Adjustment, CartState, LineItem, Order, OrderPage, OrderQuery, OrderStatus};
use crate::domain::value_objects::CheckoutData;
use crate::gateway::Caller;
use crate::store::CartRoot;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListParams {
    /// A status name, or "All".
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
}

impl OrderListParams {
    fn into_query(self, per_page: u32) -> ApiResult<OrderQuery> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(s.parse::<OrderStatus>().map_err(|e| ApiError::BadRequest(e.to_string()))?),
        };
        Ok(OrderQuery { status, from: self.from, to: self.to, page: self.page.unwrap_or(1), per_page })
    }
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    #[serde(rename = "statusDescription", skip_serializing_if = "Option::is_none")]
    pub status_description: Option<&'static str>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        let status_description = order.status().description();
        Self { order, status_description }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummary>,
    pub page: u32,
    pub total_pages: u32,
    pub total: usize,
}

impl From<OrderPage> for OrderListResponse {
    fn from(page: OrderPage) -> Self {
        Self {
            orders: page.orders.into_iter().map(OrderSummary::from).collect(),
            page: page.page,
            total_pages: page.total_pages,
            total: page.total,
        }
    }
}

/// Reloads the caller's history, then filters and pages it.
pub async fn list_orders(
    State(s): State<AppState>,
    caller: Caller,
    Query(p): Query<OrderListParams>,
) -> ApiResult<Json<OrderListResponse>> {
    let query = p.into_query(s.orders_per_page)?;
    s.checkout.refresh_orders(&caller).await?;
    let page = s.checkout.orders().lock().await.query(&query);
    Ok(Json(page.into()))
}

pub async fn view_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<OrderSummary>> {
    Ok(Json(s.checkout.view_order(id).await?.into()))
}

pub async fn current_order(State(s): State<AppState>) -> ApiResult<Json<OrderSummary>> {
    let orders = s.checkout.orders().lock().await;
    let viewed = orders.viewed().cloned().ok_or(CheckoutError::NoOrderSelected)?;
    Ok(Json(viewed.into()))
}

pub async fn close_order(State(s): State<AppState>) -> StatusCode {
    s.checkout.orders().lock().await.show_order_detail(None);
    StatusCode::NO_CONTENT
}

fn viewed_cart(cart: Option<&CartState>) -> ApiResult<CartState> {
    cart.cloned().ok_or_else(|| CheckoutError::NoOrderSelected.into())
}

pub async fn increase_item(
    State(s): State<AppState>,
    Json(r): Json<LineItemRef>,
) -> ApiResult<Json<CommandResponse<Adjustment, CartState>>> {
    let mut orders = s.checkout.orders().lock().await;
    let outcome = orders.increase(r.product_id, &r.selected_options);
    Ok(Json(CommandResponse { outcome, cart: viewed_cart(orders.cart())? }))
}

pub async fn decrease_item(
    State(s): State<AppState>,
    Json(r): Json<LineItemRef>,
) -> ApiResult<Json<CommandResponse<Adjustment, CartState>>> {
    let mut orders = s.checkout.orders().lock().await;
    let outcome = orders.decrease(r.product_id, &r.selected_options);
    Ok(Json(CommandResponse { outcome, cart: viewed_cart(orders.cart())? }))
}

pub async fn remove_item(
    State(s): State<AppState>,
    Json(r): Json<LineItemRef>,
) -> ApiResult<Json<CommandResponse<Option<LineItem>, CartState>>> {
    let mut orders = s.checkout.orders().lock().await;
    let outcome = orders.remove(r.product_id, &r.selected_options);
    Ok(Json(CommandResponse { outcome, cart: viewed_cart(orders.cart())? }))
}

pub async fn clear_items(State(s): State<AppState>) -> ApiResult<Json<CartState>> {
    let mut orders = s.checkout.orders().lock().await;
    if !orders.clear() {
        return Err(CheckoutError::NoOrderSelected.into());
    }
    Ok(Json(viewed_cart(orders.cart())?))
}

pub async fn set_checkout_data(State(s): State<AppState>, Json(data): Json<CheckoutData>) -> ApiResult<Json<CartState>> {
    let mut orders = s.checkout.orders().lock().await;
    if !orders.update_checkout_data(data) {
        return Err(CheckoutError::NoOrderSelected.into());
    }
    Ok(Json(viewed_cart(orders.cart())?))
}

pub async fn submit_edit(
    State(s): State<AppState>,
    caller: Caller,
    body: Option<Json<CheckoutDataRequest>>,
) -> ApiResult<Json<OrderSummary>> {
    let form = s.checkout_form().await?;
    let data = body.and_then(|Json(r)| r.checkout_data);
    let order = s.checkout.submit_order_edit(&caller, &form, data).await?;
    Ok(Json(order.into()))
}

pub async fn cancel_order(State(s): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    s.checkout.cancel_order(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
