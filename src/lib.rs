//! OpenSASE Storefront
//!
//! Customer-facing storefront backed by a hosted database and auth service.
//!
//! ## Features
//! - Product catalog browsing with per-variant option selection
//! - Shopping cart with option-aware line items and running totals
//! - Checkout driven by a configurable form schema
//! - Order history, order editing and cancellation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod notify;
pub mod store;

pub use domain::aggregates::{CartState, LineItem, Order, OrderStatus};
pub use domain::value_objects::{CheckoutData, SelectedOptions};

// =============================================================================
// Core Types
// =============================================================================

/// Catalog entry as served by the backend. Read-only from the cart's point of view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "imageUrls", default)]
    pub image_urls: Vec<String>,
    #[serde(rename = "productdescriptions", default)]
    pub descriptions: Vec<ProductDescription>,
    #[serde(rename = "ispublished", default)]
    pub is_published: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<Decimal>,
    #[serde(rename = "productvariants", default)]
    pub variants: Vec<ProductVariant>,
}

/// A named axis of choice on a product, e.g. "Size".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: i64,
    pub name: String,
    #[serde(rename = "ispublished", default)]
    pub is_published: bool,
    #[serde(rename = "productvariantoptions", default)]
    pub options: Vec<ProductOption>,
}

/// A selectable value within a variant. `price` replaces the product's base
/// price rather than adding to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    #[serde(rename = "ispublished", default)]
    pub is_published: bool,
    #[serde(rename = "isoutofstock", default)]
    pub is_out_of_stock: bool,
    #[serde(rename = "isdefault", default)]
    pub is_default: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductDescription {
    pub id: i64,
    pub title: String,
    pub content: String,
}

impl Product {
    pub fn published_variants(&self) -> impl Iterator<Item = &ProductVariant> {
        self.variants.iter().filter(|v| v.is_published)
    }

    /// True when some published variant has no published option left in stock.
    pub fn is_out_of_stock(&self) -> bool {
        self.published_variants().any(|variant| {
            variant
                .options
                .iter()
                .filter(|o| o.is_published)
                .all(|o| o.is_out_of_stock)
        })
    }

    /// Initial selection shown on the product page: each published variant's
    /// default option, or nothing when the variant has no default.
    pub fn default_selection(&self) -> SelectedOptions {
        self.published_variants()
            .map(|variant| {
                let default = variant.options.iter().find(|o| o.is_default).cloned();
                (variant.name.clone(), default)
            })
            .collect()
    }

    /// Resolves a `variant name -> option id` choice into a selection.
    ///
    /// Every published variant must be chosen, and only published, in-stock
    /// options can be picked.
    pub fn select_options(
        &self,
        choices: &BTreeMap<String, i64>,
    ) -> Result<SelectedOptions, SelectionError> {
        let mut selected = SelectedOptions::default();
        for (variant_name, option_id) in choices {
            let variant = self
                .published_variants()
                .find(|v| &v.name == variant_name)
                .ok_or_else(|| SelectionError::UnknownVariant(variant_name.clone()))?;
            let option = variant
                .options
                .iter()
                .find(|o| o.id == *option_id && o.is_published)
                .ok_or_else(|| SelectionError::UnknownOption {
                    variant: variant_name.clone(),
                    option_id: *option_id,
                })?;
            if option.is_out_of_stock {
                return Err(SelectionError::OutOfStock(option.name.clone()));
            }
            selected.insert(variant_name.clone(), Some(option.clone()));
        }

        if let Some(missing) = self
            .published_variants()
            .find(|v| !choices.contains_key(&v.name))
        {
            return Err(SelectionError::MissingVariant(missing.name.clone()));
        }
        Ok(selected)
    }
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("Unknown option {option_id} for variant {variant}")]
    UnknownOption { variant: String, option_id: i64 },

    #[error("No option chosen for variant {0}")]
    MissingVariant(String),

    #[error("Option {0} is out of stock")]
    OutOfStock(String),
}
