//! Cart Aggregate
//!
//! Line items plus running totals. The totals are adjusted incrementally by
//! every command rather than recomputed, so each command must move the line
//! item and the aggregate by the same amount.

use crate::domain::aggregates::order::OrderStatus;
use crate::domain::pricing::{line_total, round_price, unit_price};
use crate::domain::value_objects::{CheckoutData, SelectedOptions};
use crate::Product;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product: Product,
    #[serde(rename = "selectedOptions", default)]
    pub selected_options: SelectedOptions,
    pub quantity: u32,
    #[serde(rename = "totalPrice")]
    pub total_price: Decimal,
}

impl LineItem {
    pub fn new(product: Product, selected_options: SelectedOptions, quantity: u32) -> Self {
        let total_price = line_total(&product, &selected_options, quantity);
        Self { product, selected_options, quantity, total_price }
    }

    /// Unrounded, so stepping a line by one unit rounds only the new total.
    pub fn unit_price(&self) -> Decimal { unit_price(&self.product, &self.selected_options) }

    pub fn is_for(&self, product_id: i64, selected: &SelectedOptions) -> bool {
        self.product.id == product_id && self.selected_options.matches(selected)
    }
}

/// Line items with running quantity/price totals. Persisted as-is for carts
/// and embedded in every order record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartState {
    #[serde(rename = "cartitems", default)]
    pub items: Vec<LineItem>,
    #[serde(rename = "totalquantity", default)]
    pub total_quantity: u32,
    #[serde(rename = "totalprice", default)]
    pub total_price: Decimal,
    #[serde(rename = "checkoutdata", default, skip_serializing_if = "Option::is_none")]
    pub checkout_data: Option<CheckoutData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Appended,
    Merged,
    /// Zero quantity; nothing changed.
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    Applied,
    /// Decrease on a single unit; only removal takes an item to zero.
    AtMinimum,
    NotFound,
}

impl Adjustment {
    pub fn is_applied(self) -> bool { self == Adjustment::Applied }
}

impl CartState {
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn find(&self, product_id: i64, selected: &SelectedOptions) -> Option<&LineItem> {
        self.items.iter().find(|i| i.is_for(product_id, selected))
    }

    pub fn add(&mut self, product: Product, selected: SelectedOptions, quantity: u32) -> AddOutcome {
        if quantity == 0 { return AddOutcome::Ignored; }
        let added = line_total(&product, &selected, quantity);

        let outcome = if let Some(existing) = self.items.iter_mut().find(|i| i.is_for(product.id, &selected)) {
            existing.quantity += quantity;
            existing.total_price = round_price(existing.total_price + added);
            AddOutcome::Merged
        } else {
            self.items.push(LineItem { product, selected_options: selected, quantity, total_price: added });
            AddOutcome::Appended
        };

        self.total_quantity += quantity;
        self.total_price = round_price(self.total_price + added);
        outcome
    }

    pub fn increase(&mut self, product_id: i64, selected: &SelectedOptions) -> Adjustment {
        let Some(item) = self.items.iter_mut().find(|i| i.is_for(product_id, selected)) else {
            return Adjustment::NotFound;
        };
        let unit = item.unit_price();
        item.quantity = item.quantity.saturating_add(1);
        item.total_price = round_price(item.total_price + unit);
        self.total_quantity = self.total_quantity.saturating_add(1);
        self.total_price = round_price(self.total_price + unit);
        Adjustment::Applied
    }

    pub fn decrease(&mut self, product_id: i64, selected: &SelectedOptions) -> Adjustment {
        let Some(item) = self.items.iter_mut().find(|i| i.is_for(product_id, selected)) else {
            return Adjustment::NotFound;
        };
        if item.quantity <= 1 { return Adjustment::AtMinimum; }
        let unit = item.unit_price();
        item.quantity -= 1;
        item.total_price = round_price(item.total_price - unit);
        // Hydrated snapshots are not validated, so the totals may already be off.
        self.total_quantity = self.total_quantity.saturating_sub(1);
        self.total_price = round_price(self.total_price - unit);
        Adjustment::Applied
    }

    /// Drops the matching line item and returns it.
    pub fn remove(&mut self, product_id: i64, selected: &SelectedOptions) -> Option<LineItem> {
        let index = self.items.iter().position(|i| i.is_for(product_id, selected))?;
        let item = self.items.remove(index);
        self.total_quantity = self.total_quantity.saturating_sub(item.quantity);
        self.total_price = round_price(self.total_price - item.total_price);
        Some(item)
    }

    /// Takes the line items of `placed` out of this cart, leaving whatever was
    /// added since `placed` was copied from it.
    pub fn take_placed(&mut self, placed: &CartState) {
        for line in &placed.items {
            let Some(index) = self.items.iter().position(|i| i.is_for(line.product.id, &line.selected_options)) else {
                continue;
            };
            let (quantity, price) = if self.items[index].quantity <= line.quantity {
                let item = self.items.remove(index);
                (item.quantity, item.total_price)
            } else {
                let item = &mut self.items[index];
                item.quantity -= line.quantity;
                item.total_price = round_price(item.total_price - line.total_price);
                (line.quantity, line.total_price)
            };
            self.total_quantity = self.total_quantity.saturating_sub(quantity);
            self.total_price = round_price(self.total_price - price);
        }
        if self.items.is_empty() {
            self.clear();
        }
    }

    /// Empties the line items. Checkout data and status are kept.
    pub fn clear(&mut self) {
        self.items.clear();
        self.total_quantity = 0;
        self.total_price = Decimal::ZERO;
    }
}
