//! The shopper's cart, mirrored to local snapshot storage.

use crate::domain::aggregates::{AddOutcome, CartState};
use crate::domain::value_objects::{CheckoutData, SelectedOptions};
use crate::store::snapshot::{SnapshotError, SnapshotStorage, CART_SNAPSHOT_KEY};
use crate::store::CartRoot;
use crate::Product;

/// Snapshot writes are only enabled once the stored snapshot has been read,
/// so an empty start-up cart never overwrites a saved one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hydration {
    Uninitialized,
    Hydrated,
}

pub struct CartStore {
    state: CartState,
    hydration: Hydration,
    storage: Box<dyn SnapshotStorage>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore").field("state", &self.state).field("hydration", &self.hydration).finish_non_exhaustive()
    }
}

impl CartStore {
    pub fn new(storage: impl SnapshotStorage + 'static) -> Self {
        Self { state: CartState::default(), hydration: Hydration::Uninitialized, storage: Box::new(storage) }
    }

    pub fn state(&self) -> &CartState { &self.state }

    pub fn hydration(&self) -> Hydration { self.hydration }

    /// Loads the stored snapshot, if any, and enables snapshot writes.
    ///
    /// Returns whether a snapshot was found. A snapshot that fails to parse is
    /// discarded and the cart starts empty. Read failures leave the store
    /// uninitialized so a later attempt can still recover the saved cart.
    pub fn hydrate(&mut self) -> Result<bool, SnapshotError> {
        if self.hydration == Hydration::Hydrated {
            return Ok(false);
        }
        let found = match self.storage.read(CART_SNAPSHOT_KEY)? {
            Some(raw) => match serde_json::from_str::<CartState>(&raw) {
                Ok(snapshot) => {
                    self.state = snapshot;
                    true
                }
                Err(error) => {
                    tracing::warn!(%error, "discarding unreadable cart snapshot");
                    false
                }
            },
            None => false,
        };
        self.hydration = Hydration::Hydrated;
        tracing::info!(found, items = self.state.items.len(), "cart hydrated");
        Ok(found)
    }

    pub fn add(&mut self, product: Product, selected: SelectedOptions, quantity: u32) -> AddOutcome {
        let product_id = product.id;
        let outcome = self.state.add(product, selected, quantity);
        if outcome == AddOutcome::Ignored {
            tracing::debug!(product_id, "ignoring add with zero quantity");
        } else {
            self.persist();
        }
        outcome
    }

    /// Replaces the whole cart. The snapshot is taken as-is.
    pub fn load(&mut self, snapshot: CartState) {
        self.state = snapshot;
        self.persist();
    }

    /// Drops the lines of an order that has just been placed from this cart.
    /// Anything added while the order was in flight stays.
    pub fn take_placed(&mut self, placed: &CartState) {
        if self.state.items == placed.items {
            self.state.clear();
        } else {
            tracing::info!(items = self.state.items.len(), "cart changed during checkout, keeping newer lines");
            self.state.take_placed(placed);
        }
        self.persist();
    }

    pub fn set_checkout_data(&mut self, data: CheckoutData) {
        self.state.checkout_data = Some(data);
        self.persist();
    }

    fn persist(&mut self) {
        if self.hydration != Hydration::Hydrated {
            return;
        }
        let result = serde_json::to_string(&self.state)
            .map_err(SnapshotError::from)
            .and_then(|raw| self.storage.write(CART_SNAPSHOT_KEY, &raw));
        if let Err(error) = result {
            tracing::warn!(%error, "failed to write cart snapshot");
        }
    }
}

impl CartRoot for CartStore {
    fn cart(&self) -> Option<&CartState> { Some(&self.state) }

    fn cart_mut(&mut self) -> Option<&mut CartState> { Some(&mut self.state) }

    fn cart_changed(&mut self) { self.persist(); }
}
