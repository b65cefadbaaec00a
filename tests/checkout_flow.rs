use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use testresult::TestResult;
use uuid::Uuid;

use opensase_storefront::checkout::{CheckoutError, CheckoutForm, CheckoutService};
use opensase_storefront::gateway::{Caller, MockOrderGateway};
use opensase_storefront::notify::MockNotifier;
use opensase_storefront::store::{CartRoot, CartStore, FileSnapshotStorage, Hydration};
use opensase_storefront::{CartState, CheckoutData, Order, OrderStatus, Product};

fn hoodie() -> Result<Product, serde_json::Error> {
    serde_json::from_value(json!({
        "id": 7,
        "name": "Zip Hoodie",
        "price": 80.0,
        "ispublished": true,
        "productvariants": [
            { "id": 1, "name": "Colour", "ispublished": true, "productvariantoptions": [
                { "id": 11, "name": "Black", "price": 0.0, "ispublished": true },
                { "id": 12, "name": "Sand", "price": 5.0, "ispublished": true }
            ] },
            { "id": 2, "name": "Size", "ispublished": true, "productvariantoptions": [
                { "id": 21, "name": "M", "price": 60.0, "ispublished": true },
                { "id": 22, "name": "XL", "price": 70.0, "ispublished": true, "isoutofstock": true }
            ] }
        ]
    }))
}

fn form() -> Result<CheckoutForm, serde_json::Error> {
    serde_json::from_value(json!([
        { "id": 1, "title": "Delivery", "fields": [
            { "name": "email", "label": "Email", "type": "text", "required": true,
              "regex": "^[^@\\s]+@[^@\\s]+$", "regexError": "Enter a valid email" },
            { "name": "address", "label": "Address", "type": "textarea", "required": true }
        ] }
    ]))
}

fn checkout_data(email: &str) -> CheckoutData {
    let mut data = CheckoutData::new();
    data.insert("email", email);
    data.insert("address", "4 Marina Road");
    data
}

fn accepting_gateway() -> MockOrderGateway {
    let mut gateway = MockOrderGateway::new();
    gateway.expect_create().times(1).returning(|_, cart| {
        Ok(Order {
            id: Uuid::now_v7(),
            created_at: Utc::now(),
            cart: CartState { status: Some(OrderStatus::Pending), ..cart.clone() },
        })
    });
    gateway
}

#[tokio::test]
async fn cart_survives_restart_and_checks_out() -> TestResult {
    let dir = tempfile::tempdir()?;
    let product = hoodie()?;
    let sand_m = product.select_options(&[("Colour".to_string(), 12), ("Size".to_string(), 21)].into())?;

    {
        let mut cart = CartStore::new(FileSnapshotStorage::new(dir.path()));
        cart.hydrate()?;
        cart.add(product.clone(), sand_m.clone(), 1);
        cart.add(product.clone(), sand_m.clone(), 1);
        cart.increase(product.id, &sand_m);
        assert_eq!(cart.state().total_price, Decimal::new(195, 0));
    }

    let mut cart = CartStore::new(FileSnapshotStorage::new(dir.path()));
    assert_eq!(cart.hydration(), Hydration::Uninitialized);
    assert!(cart.hydrate()?);
    assert_eq!(cart.state().total_quantity, 3);
    assert_eq!(cart.state().items.len(), 1);

    let mut notifier = MockNotifier::new();
    notifier.expect_publish().times(1).returning(|_| Ok(()));
    let service = CheckoutService::new(Arc::new(accepting_gateway()), Arc::new(notifier), cart);

    let order = service.place_order(&Caller::authenticated(Uuid::new_v4()), &form()?, checkout_data("ada@example.com")).await?;
    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.cart.total_price, Decimal::new(195, 0));

    let mut reopened = CartStore::new(FileSnapshotStorage::new(dir.path()));
    reopened.hydrate()?;
    assert!(reopened.state().is_empty());
    assert_eq!(reopened.state().checkout_data, Some(checkout_data("ada@example.com")));
    Ok(())
}

#[tokio::test]
async fn rejected_form_keeps_cart_and_entries() -> TestResult {
    let dir = tempfile::tempdir()?;
    let product = hoodie()?;
    let black_m = product.select_options(&[("Colour".to_string(), 11), ("Size".to_string(), 21)].into())?;

    let mut cart = CartStore::new(FileSnapshotStorage::new(dir.path()));
    cart.hydrate()?;
    cart.add(product, black_m, 2);

    let mut gateway = MockOrderGateway::new();
    gateway.expect_create().never();
    let service = CheckoutService::new(Arc::new(gateway), Arc::new(MockNotifier::new()), cart);

    let result = service.place_order(&Caller::anonymous(), &form()?, checkout_data("not-an-email")).await;
    let Err(CheckoutError::Validation(errors)) = result else { panic!("expected a validation error") };
    assert_eq!(errors.get("email"), Some("Enter a valid email"));

    let cart = service.cart().lock().await;
    assert_eq!(cart.state().total_price, Decimal::new(120, 0));
    assert_eq!(cart.state().checkout_data, Some(checkout_data("not-an-email")));
    Ok(())
}

#[test]
fn out_of_stock_options_cannot_be_selected() -> TestResult {
    let product = hoodie()?;
    let choice = [("Colour".to_string(), 11), ("Size".to_string(), 22)].into();
    assert!(product.select_options(&choice).is_err());
    assert!(!product.is_out_of_stock());
    Ok(())
}
