//! Client-side state holders.
//!
//! The shopping cart and the order being viewed are two roots for the same
//! line-item commands. [`CartRoot`] gives both stores those commands on top of
//! [`CartState`], so each root only decides where its cart lives and what
//! happens after a change.

pub mod cart;
pub mod orders;
pub mod snapshot;

pub use cart::{CartStore, Hydration};
pub use orders::OrderStore;
pub use snapshot::{FileSnapshotStorage, MemorySnapshotStorage, SnapshotError, SnapshotStorage, CART_SNAPSHOT_KEY};

use crate::domain::aggregates::{Adjustment, CartState, LineItem};
use crate::domain::value_objects::SelectedOptions;

pub trait CartRoot {
    /// The cart commands act on, if there is one.
    fn cart(&self) -> Option<&CartState>;

    fn cart_mut(&mut self) -> Option<&mut CartState>;

    /// Runs after any command that changed the cart.
    fn cart_changed(&mut self) {}

    fn increase(&mut self, product_id: i64, selected: &SelectedOptions) -> Adjustment {
        let outcome = self.cart_mut().map_or(Adjustment::NotFound, |cart| cart.increase(product_id, selected));
        settle(self, outcome.is_applied(), "increase", product_id);
        outcome
    }

    fn decrease(&mut self, product_id: i64, selected: &SelectedOptions) -> Adjustment {
        let outcome = self.cart_mut().map_or(Adjustment::NotFound, |cart| cart.decrease(product_id, selected));
        settle(self, outcome.is_applied(), "decrease", product_id);
        outcome
    }

    fn remove(&mut self, product_id: i64, selected: &SelectedOptions) -> Option<LineItem> {
        let removed = self.cart_mut().and_then(|cart| cart.remove(product_id, selected));
        settle(self, removed.is_some(), "remove", product_id);
        removed
    }

    /// Empties the cart. Returns false when there is no cart to clear.
    fn clear(&mut self) -> bool {
        let Some(cart) = self.cart_mut() else { return false };
        cart.clear();
        self.cart_changed();
        true
    }
}

fn settle<R: CartRoot + ?Sized>(root: &mut R, applied: bool, command: &'static str, product_id: i64) {
    if applied {
        root.cart_changed();
    } else {
        tracing::debug!(command, product_id, "line item command not applied");
    }
}
