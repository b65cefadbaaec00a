//! Gateway over the backend's Postgres database.
//!
//! Orders keep their line items as a JSON document, exactly as the client
//! holds them; the catalog is relational and is reassembled into [`Product`]s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::checkout::AppSettings;
use crate::domain::aggregates::{CartState, LineItem, Order, OrderStatus};
use crate::domain::value_objects::CheckoutData;
use crate::gateway::{Caller, CatalogGateway, GatewayError, OrderGateway, OrderPatch};
use crate::{Product, ProductDescription, ProductOption, ProductVariant};

const ORDER_COLUMNS: &str = "id, cartitems, totalquantity, totalprice, checkoutdata, status, created_at";

#[derive(Clone, Debug)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool { &self.pool }

    async fn fetch_products(&self, only: Option<i64>) -> Result<Vec<Product>, GatewayError> {
        let products = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, category, labels, price, discount, tax, ispublished FROM products \
             WHERE ispublished AND ($1::BIGINT IS NULL OR id = $1) ORDER BY id",
        )
        .bind(only)
        .fetch_all(&self.pool)
        .await?;
        if products.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();

        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT productid, url FROM productimages WHERE productid = ANY($1) ORDER BY position, id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        let descriptions = sqlx::query_as::<_, DescriptionRow>(
            "SELECT id, productid, title, content FROM productdescriptions WHERE productid = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        let variants = sqlx::query_as::<_, VariantRow>(
            "SELECT id, productid, name, ispublished FROM productvariants WHERE productid = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        let variant_ids: Vec<i64> = variants.iter().map(|v| v.id).collect();
        let options = sqlx::query_as::<_, OptionRow>(
            "SELECT id, variantid, name, price, ispublished, isoutofstock, isdefault FROM productvariantoptions \
             WHERE variantid = ANY($1) ORDER BY id",
        )
        .bind(&variant_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(assemble_products(products, images, descriptions, variants, options))
    }
}

#[async_trait]
impl OrderGateway for PgGateway {
    async fn create(&self, caller: &Caller, cart: &CartState) -> Result<Order, GatewayError> {
        let user_id = caller.require_user()?;
        let status = cart.status.unwrap_or_default();
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (id, userid, cartitems, totalquantity, totalprice, checkoutdata, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(Json(&cart.items))
        .bind(i64::from(cart.total_quantity))
        .bind(cart.total_price)
        .bind(cart.checkout_data.as_ref().map(Json))
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(order_id = %row.id, %user_id, "order created");
        row.try_into()
    }

    async fn update(&self, caller: &Caller, id: Uuid, patch: OrderPatch) -> Result<Order, GatewayError> {
        let user_id = caller.require_user()?;
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET \
                cartitems = COALESCE($3, cartitems), \
                totalquantity = COALESCE($4, totalquantity), \
                totalprice = COALESCE($5, totalprice), \
                checkoutdata = COALESCE($6, checkoutdata), \
                status = COALESCE($7, status), \
                updated_at = NOW() \
             WHERE id = $1 AND userid = $2 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.items.map(Json))
        .bind(patch.total_quantity.map(i64::from))
        .bind(patch.total_price)
        .bind(patch.checkout_data.map(Json))
        .bind(patch.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(GatewayError::OrderNotFound)?;
        tracing::info!(order_id = %id, "order updated");
        row.try_into()
    }

    async fn cancel(&self, caller: &Caller, id: Uuid) -> Result<(), GatewayError> {
        let user_id = caller.require_user()?;
        let result = sqlx::query("UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND userid = $2")
            .bind(id)
            .bind(user_id)
            .bind(OrderStatus::Cancelled.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::OrderNotFound);
        }
        tracing::info!(order_id = %id, "order cancelled");
        Ok(())
    }

    async fn list(&self, caller: &Caller) -> Result<Vec<Order>, GatewayError> {
        let Some(user_id) = caller.user_id() else { return Ok(vec![]) };
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE userid = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }
}

#[async_trait]
impl CatalogGateway for PgGateway {
    async fn list_products(&self) -> Result<Vec<Product>, GatewayError> { self.fetch_products(None).await }

    async fn get_product(&self, id: i64) -> Result<Option<Product>, GatewayError> {
        Ok(self.fetch_products(Some(id)).await?.into_iter().next())
    }

    async fn app_settings(&self) -> Result<AppSettings, GatewayError> {
        let row: Option<(Json<AppSettings>,)> =
            sqlx::query_as("SELECT data FROM branding ORDER BY created_at DESC LIMIT 1").fetch_optional(&self.pool).await?;
        row.map(|(Json(settings),)| settings).ok_or_else(|| GatewayError::Malformed("no branding settings stored".into()))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    cartitems: Json<Vec<LineItem>>,
    totalquantity: i64,
    totalprice: Decimal,
    checkoutdata: Option<Json<CheckoutData>>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = GatewayError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let total_quantity = u32::try_from(row.totalquantity)
            .map_err(|_| GatewayError::Malformed(format!("order {} has quantity {}", row.id, row.totalquantity)))?;
        Ok(Order {
            id: row.id,
            created_at: row.created_at,
            cart: CartState {
                items: row.cartitems.0,
                total_quantity,
                total_price: row.totalprice,
                checkout_data: row.checkoutdata.map(|Json(data)| data),
                status: Some(row.status.parse()?),
            },
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    category: Option<String>,
    labels: Vec<String>,
    price: Decimal,
    discount: Option<Decimal>,
    tax: Option<Decimal>,
    ispublished: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    productid: i64,
    url: String,
}

#[derive(Debug, sqlx::FromRow)]
struct DescriptionRow {
    id: i64,
    productid: i64,
    title: String,
    content: String,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i64,
    productid: i64,
    name: String,
    ispublished: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct OptionRow {
    id: i64,
    variantid: i64,
    name: String,
    price: Decimal,
    ispublished: bool,
    isoutofstock: bool,
    isdefault: bool,
}

fn assemble_products(
    products: Vec<ProductRow>,
    images: Vec<ImageRow>,
    descriptions: Vec<DescriptionRow>,
    variants: Vec<VariantRow>,
    options: Vec<OptionRow>,
) -> Vec<Product> {
    let mut images_by_product: HashMap<i64, Vec<String>> = HashMap::new();
    for image in images {
        images_by_product.entry(image.productid).or_default().push(image.url);
    }
    let mut descriptions_by_product: HashMap<i64, Vec<ProductDescription>> = HashMap::new();
    for d in descriptions {
        descriptions_by_product
            .entry(d.productid)
            .or_default()
            .push(ProductDescription { id: d.id, title: d.title, content: d.content });
    }
    let mut options_by_variant: HashMap<i64, Vec<ProductOption>> = HashMap::new();
    for o in options {
        options_by_variant.entry(o.variantid).or_default().push(ProductOption {
            id: o.id,
            name: o.name,
            price: o.price,
            is_published: o.ispublished,
            is_out_of_stock: o.isoutofstock,
            is_default: o.isdefault,
        });
    }
    let mut variants_by_product: HashMap<i64, Vec<ProductVariant>> = HashMap::new();
    for v in variants {
        let options = options_by_variant.remove(&v.id).unwrap_or_default();
        variants_by_product
            .entry(v.productid)
            .or_default()
            .push(ProductVariant { id: v.id, name: v.name, is_published: v.ispublished, options });
    }

    products
        .into_iter()
        .map(|p| {
            let image_urls = images_by_product.remove(&p.id).unwrap_or_default();
            Product {
                id: p.id,
                name: p.name,
                image: image_urls.first().cloned(),
                image_urls,
                descriptions: descriptions_by_product.remove(&p.id).unwrap_or_default(),
                is_published: p.ispublished,
                category: p.category.unwrap_or_default(),
                labels: p.labels,
                price: p.price,
                discount: p.discount,
                tax: p.tax,
                variants: variants_by_product.remove(&p.id).unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_row(id: i64) -> ProductRow {
        ProductRow {
            id,
            name: format!("Product {id}"),
            category: None,
            labels: vec!["new".into()],
            price: Decimal::new(30, 0),
            discount: None,
            tax: None,
            ispublished: true,
        }
    }

    #[test]
    fn test_assemble_products_groups_children() {
        let products = assemble_products(
            vec![product_row(1), product_row(2)],
            vec![
                ImageRow { productid: 1, url: "/a.jpg".into() },
                ImageRow { productid: 1, url: "/b.jpg".into() },
            ],
            vec![DescriptionRow { id: 5, productid: 2, title: "Care".into(), content: "Hand wash".into() }],
            vec![VariantRow { id: 10, productid: 1, name: "Size".into(), ispublished: true }],
            vec![
                OptionRow { id: 100, variantid: 10, name: "S".into(), price: Decimal::new(25, 0), ispublished: true, isoutofstock: false, isdefault: true },
                OptionRow { id: 101, variantid: 10, name: "L".into(), price: Decimal::new(35, 0), ispublished: true, isoutofstock: true, isdefault: false },
            ],
        );

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].image.as_deref(), Some("/a.jpg"));
        assert_eq!(products[0].image_urls.len(), 2);
        assert_eq!(products[0].variants[0].options.len(), 2);
        assert!(products[0].variants[0].options[1].is_out_of_stock);
        assert_eq!(products[0].category, "");
        assert!(products[1].variants.is_empty());
        assert!(products[1].image.is_none());
        assert_eq!(products[1].descriptions[0].title, "Care");
    }

    #[test]
    fn test_order_row_conversion() {
        let row = OrderRow {
            id: Uuid::now_v7(),
            cartitems: Json(vec![]),
            totalquantity: 0,
            totalprice: Decimal::ZERO,
            checkoutdata: None,
            status: "Shipped".into(),
            created_at: Utc::now(),
        };
        let order = Order::try_from(row).unwrap();
        assert_eq!(order.status(), OrderStatus::Shipped);
    }

    #[test]
    fn test_order_row_rejects_bad_values() {
        let row = |quantity: i64, status: &str| OrderRow {
            id: Uuid::now_v7(),
            cartitems: Json(vec![]),
            totalquantity: quantity,
            totalprice: Decimal::ZERO,
            checkoutdata: None,
            status: status.into(),
            created_at: Utc::now(),
        };
        assert!(matches!(Order::try_from(row(-1, "Pending")), Err(GatewayError::Malformed(_))));
        assert!(matches!(Order::try_from(row(1, "Lost")), Err(GatewayError::Malformed(_))));
    }
}
