//! Value Objects for the storefront

use crate::ProductOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Chosen option per variant name. A variant may be present but not yet chosen.
///
/// Two selections identify the same line item when they cover the same
/// variants and every variant has a chosen option with the same id. An
/// unchosen variant never matches anything, itself included.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedOptions(BTreeMap<String, Option<ProductOption>>);

impl SelectedOptions {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, variant: impl Into<String>, option: Option<ProductOption>) {
        self.0.insert(variant.into(), option);
    }

    pub fn get(&self, variant: &str) -> Option<&Option<ProductOption>> { self.0.get(variant) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Options that have actually been chosen.
    pub fn chosen(&self) -> impl Iterator<Item = &ProductOption> {
        self.0.values().flatten()
    }

    pub fn matches(&self, other: &SelectedOptions) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().all(|(variant, option)| match (option, other.0.get(variant)) {
                (Some(mine), Some(Some(theirs))) => mine.id == theirs.id,
                _ => false,
            })
    }
}

impl FromIterator<(String, Option<ProductOption>)> for SelectedOptions {
    fn from_iter<I: IntoIterator<Item = (String, Option<ProductOption>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Checkout form values keyed by field name. The shape is dictated by the
/// checkout form schema, so values stay loosely typed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutData(BTreeMap<String, Value>);

impl CheckoutData {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> { self.0.iter() }

    /// String form of a field, as used in notifications.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl From<BTreeMap<String, Value>> for CheckoutData {
    fn from(values: BTreeMap<String, Value>) -> Self { Self(values) }
}
