//! Checkout and order-edit submission.
//!
//! The service owns the shopper's cart and order stores and is the only place
//! that talks to the order gateway on their behalf. Store locks are never held
//! across a gateway call, so the submission flag is what keeps a second submit
//! out while one is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::checkout::{CheckoutForm, FieldErrors};
use crate::domain::aggregates::Order;
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::CheckoutData;
use crate::gateway::{Caller, GatewayError, OrderGateway, OrderPatch};
use crate::notify::Notifier;
use crate::store::{CartRoot, CartStore, OrderStore};

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Please fill all required fields correctly ({0})")]
    Validation(FieldErrors),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("A submission is already in progress")]
    SubmissionInProgress,

    #[error("No order is open for editing")]
    NoOrderSelected,

    #[error("Order {0} is not in the order history")]
    UnknownOrder(Uuid),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<FieldErrors> for CheckoutError {
    fn from(errors: FieldErrors) -> Self { Self::Validation(errors) }
}

pub struct CheckoutService {
    gateway: Arc<dyn OrderGateway>,
    notifier: Arc<dyn Notifier>,
    cart: Mutex<CartStore>,
    orders: Mutex<OrderStore>,
    submitting: AtomicBool,
}

impl CheckoutService {
    pub fn new(gateway: Arc<dyn OrderGateway>, notifier: Arc<dyn Notifier>, cart: CartStore) -> Self {
        Self { gateway, notifier, cart: Mutex::new(cart), orders: Mutex::new(OrderStore::new()), submitting: AtomicBool::new(false) }
    }

    pub fn cart(&self) -> &Mutex<CartStore> { &self.cart }

    pub fn orders(&self) -> &Mutex<OrderStore> { &self.orders }

    /// Validates the checkout form and turns the cart into an order.
    ///
    /// The entered data is kept on the cart whatever the outcome. The placed
    /// lines leave the cart only once the backend has accepted the order.
    pub async fn place_order(&self, caller: &Caller, form: &CheckoutForm, data: CheckoutData) -> Result<Order, CheckoutError> {
        let _submission = Submission::begin(&self.submitting)?;

        let snapshot = {
            let mut cart = self.cart.lock().await;
            let verdict = form.validate(&data);
            cart.set_checkout_data(data);
            verdict?;
            if cart.state().is_empty() {
                return Err(CheckoutError::EmptyCart);
            }
            cart.state().clone()
        };

        let order = self.gateway.create(caller, &snapshot).await.map_err(|error| {
            tracing::error!(%error, items = snapshot.items.len(), "failed to create order");
            error
        })?;

        self.cart.lock().await.take_placed(&snapshot);
        tracing::info!(order_id = %order.id, total_price = %order.cart.total_price, "order placed");
        self.announce(OrderEvent::created(&order)).await;
        Ok(order)
    }

    /// Reloads the caller's order history from the backend.
    pub async fn refresh_orders(&self, caller: &Caller) -> Result<usize, CheckoutError> {
        let orders = self.gateway.list(caller).await.map_err(|error| {
            tracing::error!(%error, "failed to load orders");
            error
        })?;
        let count = orders.len();
        self.orders.lock().await.load_orders(orders);
        Ok(count)
    }

    /// Opens a listed order for viewing and editing.
    pub async fn view_order(&self, id: Uuid) -> Result<Order, CheckoutError> {
        let mut orders = self.orders.lock().await;
        let order = orders.find(id).cloned().ok_or(CheckoutError::UnknownOrder(id))?;
        orders.show_order_detail(Some(order.clone()));
        Ok(order)
    }

    /// Sends the edited copy of the viewed order to the backend.
    ///
    /// `data`, when given, replaces the order's checkout data first. On
    /// success the listed copy is replaced, and the edited order's line items
    /// are cleared if it is still the one being viewed.
    pub async fn submit_order_edit(
        &self,
        caller: &Caller,
        form: &CheckoutForm,
        data: Option<CheckoutData>,
    ) -> Result<Order, CheckoutError> {
        let _submission = Submission::begin(&self.submitting)?;

        let edited = {
            let mut orders = self.orders.lock().await;
            if let Some(data) = data {
                orders.update_checkout_data(data);
            }
            let viewed = orders.viewed().cloned().ok_or(CheckoutError::NoOrderSelected)?;
            form.validate(viewed.cart.checkout_data.as_ref().unwrap_or(&CheckoutData::new()))?;
            if viewed.cart.is_empty() {
                return Err(CheckoutError::EmptyCart);
            }
            viewed
        };

        let updated = self.gateway.update(caller, edited.id, OrderPatch::from_cart(&edited.cart)).await.map_err(|error| {
            tracing::error!(order_id = %edited.id, %error, "failed to update order");
            error
        })?;

        {
            let mut orders = self.orders.lock().await;
            orders.refresh(&updated);
            if orders.viewed().map(|o| o.id) == Some(edited.id) {
                orders.clear();
            }
        }
        tracing::info!(order_id = %updated.id, "order edit submitted");
        self.announce(OrderEvent::updated(&updated)).await;
        Ok(updated)
    }

    pub async fn cancel_order(&self, caller: &Caller, id: Uuid) -> Result<(), CheckoutError> {
        self.gateway.cancel(caller, id).await.map_err(|error| {
            tracing::error!(order_id = %id, %error, "failed to cancel order");
            error
        })?;
        self.orders.lock().await.mark_cancelled(id);
        self.announce(OrderEvent::Cancelled { order_id: id }).await;
        Ok(())
    }

    async fn announce(&self, event: OrderEvent) {
        if let Err(error) = self.notifier.publish(&event).await {
            tracing::warn!(order_id = %event.order_id(), %error, "order saved, but notification failed");
        }
    }
}

/// Holds the submission flag until dropped.
struct Submission<'a>(&'a AtomicBool);

impl<'a> Submission<'a> {
    fn begin(flag: &'a AtomicBool) -> Result<Self, CheckoutError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CheckoutError::SubmissionInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::tests::{sample_form, valid_data};
    use crate::domain::aggregates::{CartState, OrderStatus};
    use crate::domain::value_objects::SelectedOptions;
    use crate::fixtures::{plain, shirt, size};
    use crate::gateway::MockOrderGateway;
    use crate::notify::{MockNotifier, NotifyError};
    use crate::store::MemorySnapshotStorage;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tokio::sync::Notify;

    /// Holds every create and update until released.
    #[derive(Default)]
    struct HeldGateway {
        entered: Notify,
        release: Notify,
    }

    impl HeldGateway {
        async fn hold(&self) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    #[async_trait]
    impl OrderGateway for HeldGateway {
        async fn create(&self, _: &Caller, cart: &CartState) -> Result<Order, GatewayError> {
            self.hold().await;
            Ok(order_from(cart))
        }

        async fn update(&self, _: &Caller, id: Uuid, patch: OrderPatch) -> Result<Order, GatewayError> {
            self.hold().await;
            let cart = CartState {
                items: patch.items.unwrap_or_default(),
                total_quantity: patch.total_quantity.unwrap_or_default(),
                total_price: patch.total_price.unwrap_or_default(),
                ..CartState::default()
            };
            Ok(Order { id, ..order_from(&cart) })
        }

        async fn cancel(&self, _: &Caller, _: Uuid) -> Result<(), GatewayError> { Ok(()) }

        async fn list(&self, _: &Caller) -> Result<Vec<Order>, GatewayError> { Ok(vec![]) }
    }

    fn order_from(cart: &CartState) -> Order {
        Order {
            id: Uuid::now_v7(),
            created_at: Utc::now(),
            cart: CartState { status: Some(OrderStatus::Pending), ..cart.clone() },
        }
    }

    fn quiet_notifier() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_publish().returning(|_| Ok(()));
        notifier
    }

    fn service_with_cart(gateway: MockOrderGateway, notifier: MockNotifier) -> CheckoutService {
        let product = shirt();
        let mut cart = CartStore::new(MemorySnapshotStorage::new());
        cart.hydrate().unwrap();
        cart.add(product.clone(), size(&product, "Medium"), 2);
        CheckoutService::new(Arc::new(gateway), Arc::new(notifier), cart)
    }

    #[tokio::test]
    async fn test_place_order_clears_cart_and_notifies() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_create()
            .withf(|_, cart| cart.total_quantity == 2 && cart.checkout_data.is_some())
            .times(1)
            .returning(|_, cart| Ok(order_from(cart)));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_publish()
            .withf(|event| matches!(event, OrderEvent::Created { total_quantity: 2, .. }))
            .times(1)
            .returning(|_| Ok(()));

        let service = service_with_cart(gateway, notifier);
        let order = service.place_order(&Caller::authenticated(Uuid::new_v4()), &sample_form(), valid_data()).await.unwrap();

        assert_eq!(order.cart.total_price, Decimal::new(100, 0));
        let cart = service.cart().lock().await;
        assert!(cart.state().is_empty());
        assert_eq!(cart.state().checkout_data, Some(valid_data()));
    }

    #[tokio::test]
    async fn test_invalid_form_blocks_submission() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_create().never();
        let service = service_with_cart(gateway, MockNotifier::new());

        let mut data = valid_data();
        data.insert("email", "");
        let err = service.place_order(&Caller::anonymous(), &sample_form(), data.clone()).await.unwrap_err();

        match err {
            CheckoutError::Validation(errors) => assert_eq!(errors.get("email"), Some("This field is required")),
            other => panic!("unexpected error: {other}"),
        }
        let cart = service.cart().lock().await;
        assert_eq!(cart.state().total_quantity, 2);
        assert_eq!(cart.state().checkout_data, Some(data));
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_create().never();
        let service = CheckoutService::new(
            Arc::new(gateway),
            Arc::new(MockNotifier::new()),
            CartStore::new(MemorySnapshotStorage::new()),
        );
        let err = service.place_order(&Caller::anonymous(), &sample_form(), valid_data()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_cart() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_create().times(1).returning(|_, _| Err(GatewayError::Unauthenticated));
        let service = service_with_cart(gateway, MockNotifier::new());

        let err = service.place_order(&Caller::anonymous(), &sample_form(), valid_data()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(GatewayError::Unauthenticated)));
        assert_eq!(service.cart().lock().await.state().total_quantity, 2);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_order() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_create().returning(|_, cart| Ok(order_from(cart)));
        let mut notifier = MockNotifier::new();
        notifier.expect_publish().returning(|_| Err(NotifyError::Publish("no responders".into())));

        let service = service_with_cart(gateway, notifier);
        assert!(service.place_order(&Caller::anonymous(), &sample_form(), valid_data()).await.is_ok());
        assert!(service.cart().lock().await.state().is_empty());
    }

    #[tokio::test]
    async fn test_second_submission_is_rejected_while_in_flight() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_create().never();
        let service = service_with_cart(gateway, MockNotifier::new());

        let held = Submission::begin(&service.submitting).unwrap();
        let err = service.place_order(&Caller::anonymous(), &sample_form(), valid_data()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::SubmissionInProgress));

        drop(held);
        assert!(!service.submitting.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_order_edit_round_trip() {
        let user = Caller::authenticated(Uuid::new_v4());
        let product = shirt();
        let mut placed = CartState::default();
        placed.add(product.clone(), size(&product, "Small"), 3);
        placed.checkout_data = Some(valid_data());
        let listed = order_from(&placed);
        let listed_id = listed.id;

        let mut gateway = MockOrderGateway::new();
        let history = vec![listed.clone()];
        gateway.expect_list().times(1).returning(move |_| Ok(history.clone()));
        gateway
            .expect_update()
            .withf(move |_, id, patch| *id == listed_id && patch.total_quantity == Some(2) && patch.status.is_none())
            .times(1)
            .returning(move |_, id, patch| {
                let mut stored = listed.clone();
                stored.id = id;
                stored.cart.items = patch.items.unwrap_or_default();
                stored.cart.total_quantity = patch.total_quantity.unwrap_or_default();
                stored.cart.total_price = patch.total_price.unwrap_or_default();
                Ok(stored)
            });

        let service = CheckoutService::new(
            Arc::new(gateway),
            Arc::new(quiet_notifier()),
            CartStore::new(MemorySnapshotStorage::new()),
        );
        assert_eq!(service.refresh_orders(&user).await.unwrap(), 1);
        service.view_order(listed_id).await.unwrap();
        service.orders().lock().await.decrease(product.id, &size(&product, "Small"));

        let updated = service.submit_order_edit(&user, &sample_form(), None).await.unwrap();
        assert_eq!(updated.cart.total_price, Decimal::new(80, 0));

        let orders = service.orders().lock().await;
        assert_eq!(orders.find(listed_id).unwrap().cart.total_quantity, 2);
        let viewed = orders.viewed().unwrap();
        assert_eq!(viewed.id, listed_id);
        assert!(viewed.cart.items.is_empty());
    }

    #[tokio::test]
    async fn test_items_added_during_checkout_stay_in_cart() {
        let gateway = Arc::new(HeldGateway::default());
        let product = shirt();
        let mut cart = CartStore::new(MemorySnapshotStorage::new());
        cart.hydrate().unwrap();
        cart.add(product.clone(), size(&product, "Medium"), 2);
        let service = CheckoutService::new(gateway.clone(), Arc::new(quiet_notifier()), cart);

        let mug = plain(2, Decimal::new(1299, 2));
        let (caller, form) = (Caller::anonymous(), sample_form());
        let (placed, ()) = tokio::join!(service.place_order(&caller, &form, valid_data()), async {
            gateway.entered.notified().await;
            service.cart().lock().await.add(mug.clone(), SelectedOptions::new(), 1);
            gateway.release.notify_one();
        });

        assert_eq!(placed.unwrap().cart.items.len(), 1);
        let cart = service.cart().lock().await;
        assert_eq!(cart.state().items.len(), 1);
        assert_eq!(cart.state().items[0].product.id, mug.id);
        assert_eq!((cart.state().total_quantity, cart.state().total_price), (1, Decimal::new(1299, 2)));
    }

    #[tokio::test]
    async fn test_order_opened_during_edit_is_left_alone() {
        let gateway = Arc::new(HeldGateway::default());
        let product = shirt();
        let listed = |name: &str| {
            let mut cart = CartState { checkout_data: Some(valid_data()), ..CartState::default() };
            cart.add(product.clone(), size(&product, name), 1);
            order_from(&cart)
        };
        let (edited, other) = (listed("Small"), listed("Large"));
        let service = CheckoutService::new(
            gateway.clone(),
            Arc::new(quiet_notifier()),
            CartStore::new(MemorySnapshotStorage::new()),
        );
        service.orders().lock().await.load_orders(vec![edited.clone(), other.clone()]);
        service.view_order(edited.id).await.unwrap();

        let (caller, form) = (Caller::anonymous(), sample_form());
        let (submitted, ()) = tokio::join!(service.submit_order_edit(&caller, &form, None), async {
            gateway.entered.notified().await;
            service.view_order(other.id).await.unwrap();
            gateway.release.notify_one();
        });

        assert_eq!(submitted.unwrap().id, edited.id);
        let orders = service.orders().lock().await;
        let viewed = orders.viewed().unwrap();
        assert_eq!(viewed.id, other.id);
        assert_eq!(viewed.cart, other.cart);
    }

    #[tokio::test]
    async fn test_order_edit_requires_viewed_order() {
        let service = CheckoutService::new(
            Arc::new(MockOrderGateway::new()),
            Arc::new(MockNotifier::new()),
            CartStore::new(MemorySnapshotStorage::new()),
        );
        let err = service.submit_order_edit(&Caller::anonymous(), &sample_form(), None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NoOrderSelected));
        assert!(matches!(service.view_order(Uuid::new_v4()).await, Err(CheckoutError::UnknownOrder(_))));
    }

    #[tokio::test]
    async fn test_cancel_marks_local_copies() {
        let user = Caller::authenticated(Uuid::new_v4());
        let listed = order_from(&CartState::default());
        let id = listed.id;

        let mut gateway = MockOrderGateway::new();
        gateway.expect_list().returning(move |_| Ok(vec![listed.clone()]));
        gateway.expect_cancel().withf(move |_, cancelled| *cancelled == id).times(1).returning(|_, _| Ok(()));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_publish()
            .withf(move |event| *event == OrderEvent::Cancelled { order_id: id })
            .times(1)
            .returning(|_| Ok(()));

        let service = CheckoutService::new(Arc::new(gateway), Arc::new(notifier), CartStore::new(MemorySnapshotStorage::new()));
        service.refresh_orders(&user).await.unwrap();
        service.cancel_order(&user, id).await.unwrap();
        assert_eq!(service.orders().lock().await.find(id).unwrap().status(), OrderStatus::Cancelled);
    }
}
