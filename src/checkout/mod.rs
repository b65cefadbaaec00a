//! Checkout form schema, initial values and validation.
//!
//! The form is not fixed: the store's branding settings carry a list of
//! sections and fields, and whatever the shopper enters is kept verbatim as
//! [`CheckoutData`] on the cart and, later, the order.

pub mod service;

pub use service::{CheckoutError, CheckoutService};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::value_objects::CheckoutData;

/// The branding document stored by the backend. Only the checkout part is
/// interpreted here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branding: Option<Branding>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_title: Option<String>,
    #[serde(default)]
    pub checkout_sections: Vec<CheckoutSection>,
}

impl AppSettings {
    pub fn checkout_form(&self) -> CheckoutForm {
        CheckoutForm { sections: self.branding.as_ref().map(|b| b.checkout_sections.clone()).unwrap_or_default() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutForm {
    pub sections: Vec<CheckoutSection>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSection {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub fields: Vec<CheckoutField>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutField {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType { Text, Textarea, Radio, Dropdown, Checkbox }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOption {
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub default_value: bool,
}

/// Per-field messages for a rejected form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn get(&self, field: &str) -> Option<&str> { self.0.get(field).map(String::as_str) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn fields(&self) -> impl Iterator<Item = &str> { self.0.keys().map(String::as_str) }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) need attention", self.0.len())
    }
}

const REQUIRED_MESSAGE: &str = "This field is required";
const INVALID_FORMAT: &str = "Invalid format";
const INVALID_REGEX: &str = "Invalid regex";

impl CheckoutForm {
    pub fn fields(&self) -> impl Iterator<Item = &CheckoutField> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    /// Values the form opens with. Anything the shopper already entered wins
    /// over schema defaults.
    pub fn initial_values(&self, existing: Option<&CheckoutData>) -> CheckoutData {
        let mut values = CheckoutData::new();
        for field in self.fields() {
            let value = match existing.and_then(|data| data.get(&field.name)) {
                Some(current) => current.clone(),
                None => field.default_for_empty_form(),
            };
            values.insert(field.name.clone(), value);
        }
        values
    }

    /// Checks required fields and patterns, reporting every failing field.
    pub fn validate(&self, data: &CheckoutData) -> Result<(), FieldErrors> {
        let mut errors = BTreeMap::new();
        for field in self.fields() {
            let value = data.get(&field.name);
            let filled = value.is_some_and(is_truthy);
            if field.required && !filled {
                errors.insert(field.name.clone(), REQUIRED_MESSAGE.to_string());
            }
            if let (Some(pattern), Some(value), true) = (&field.regex, value, filled) {
                if matches!(field.field_type, FieldType::Text | FieldType::Textarea) {
                    if let Err(message) = field.check_pattern(pattern, value) {
                        errors.insert(field.name.clone(), message);
                    }
                }
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(FieldErrors(errors)) }
    }
}

impl CheckoutField {
    fn default_for_empty_form(&self) -> Value {
        match self.field_type {
            FieldType::Radio | FieldType::Dropdown if !self.options.is_empty() => {
                if let Some(default) = &self.default_value {
                    return default.clone();
                }
                self.options
                    .iter()
                    .find(|o| o.default_value)
                    .or_else(|| self.options.iter().find(|o| !o.disabled))
                    .map_or_else(|| Value::String(String::new()), |o| Value::String(o.value.clone()))
            }
            FieldType::Checkbox => self.default_value.clone().unwrap_or(Value::Bool(false)),
            _ => self.default_value.clone().unwrap_or_else(|| Value::String(String::new())),
        }
    }

    fn check_pattern(&self, pattern: &str, value: &Value) -> Result<(), String> {
        let message = |fallback: &str| self.regex_error.clone().unwrap_or_else(|| fallback.to_string());
        let re = Regex::new(pattern).map_err(|_| message(INVALID_REGEX))?;
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if re.is_match(&text) { Ok(()) } else { Err(message(INVALID_FORMAT)) }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
