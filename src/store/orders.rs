//! Order history and the order currently open for viewing or editing.

use uuid::Uuid;

use crate::domain::aggregates::{CartState, Order, OrderPage, OrderQuery, OrderStatus};
use crate::domain::value_objects::CheckoutData;
use crate::store::CartRoot;

#[derive(Debug, Default, Clone)]
pub struct OrderStore {
    orders: Vec<Order>,
    viewed: Option<Order>,
}

impl OrderStore {
    pub fn new() -> Self { Self::default() }

    pub fn orders(&self) -> &[Order] { &self.orders }

    pub fn load_orders(&mut self, orders: Vec<Order>) { self.orders = orders; }

    pub fn find(&self, id: Uuid) -> Option<&Order> { self.orders.iter().find(|o| o.id == id) }

    pub fn query(&self, query: &OrderQuery) -> OrderPage { query.apply(&self.orders) }

    pub fn viewed(&self) -> Option<&Order> { self.viewed.as_ref() }

    /// Opens `order` for viewing, replacing whatever was open. `None` closes it.
    pub fn show_order_detail(&mut self, order: Option<Order>) { self.viewed = order; }

    /// Returns false when no order is open.
    pub fn update_checkout_data(&mut self, data: CheckoutData) -> bool {
        match self.viewed.as_mut() {
            Some(order) => {
                order.cart.checkout_data = Some(data);
                true
            }
            None => false,
        }
    }

    /// Replaces the listed copy of an order the backend has returned.
    pub fn refresh(&mut self, order: &Order) {
        if let Some(listed) = self.orders.iter_mut().find(|o| o.id == order.id) {
            *listed = order.clone();
        }
    }

    /// Marks every local copy of `id` as cancelled.
    pub fn mark_cancelled(&mut self, id: Uuid) {
        let copies = self.orders.iter_mut().chain(self.viewed.as_mut()).filter(|o| o.id == id);
        for order in copies {
            order.cart.status = Some(OrderStatus::Cancelled);
        }
    }
}

impl CartRoot for OrderStore {
    fn cart(&self) -> Option<&CartState> { self.viewed.as_ref().map(|o| &o.cart) }

    fn cart_mut(&mut self) -> Option<&mut CartState> { self.viewed.as_mut().map(|o| &mut o.cart) }
}
