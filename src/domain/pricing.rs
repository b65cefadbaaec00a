//! Line item pricing.
//!
//! An option's price stands in for the product price: the per-unit price is the
//! sum of the chosen options' prices. The product's base price is only used when
//! nothing has been chosen, so a selection whose options are all free costs zero.

use crate::domain::value_objects::SelectedOptions;
use crate::Product;
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to cents, halves away from zero.
pub fn round_price(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unrounded price of a single unit.
pub fn unit_price(product: &Product, selected: &SelectedOptions) -> Decimal {
    let mut chosen = selected.chosen().peekable();
    if chosen.peek().is_none() {
        return product.price;
    }
    chosen.map(|option| option.price).sum()
}

pub fn line_total(product: &Product, selected: &SelectedOptions, quantity: u32) -> Decimal {
    round_price(unit_price(product, selected) * Decimal::from(quantity))
}
