//! Catalog product records.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{CategoryId, LocalizedText, Price, ProductId};

/// Separator used when a characteristic arrives as a list of values.
const CHARACTERISTIC_SEPARATOR: &str = "\n";

/// An immutable product descriptor.
///
/// Decoding is lenient where the backend is: absent prices become zero and
/// characteristics are normalized to single strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    #[serde(default)]
    pub label: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default, deserialize_with = "deserialize_characteristics")]
    pub characteristics: BTreeMap<String, String>,
    /// Category id (the backend spells the field `categorie`).
    #[serde(rename = "categorie", default)]
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub stock: i64,
    /// One-off unit price.
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub price_monthly: Price,
    #[serde(default)]
    pub price_annual: Price,
    /// Tax rate as configured server-side (display only).
    #[serde(rename = "taxe", default)]
    pub tax_rate: Price,
    /// Whether the product is sold as a recurring subscription.
    #[serde(default)]
    pub subscription: bool,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub similar_products: Vec<ProductId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Image URL.
    #[serde(rename = "picture", default)]
    pub image_url: String,
}

const fn default_active() -> bool {
    true
}

impl Product {
    /// Display label for `locale`.
    #[must_use]
    pub fn label_for(&self, locale: &str) -> &str {
        self.label.get_or_empty(locale)
    }

    /// Display description for `locale`.
    #[must_use]
    pub fn description_for(&self, locale: &str) -> &str {
        self.description.get_or_empty(locale)
    }

    /// Whether any unit is in stock.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Normalize `{k: "v"}` and `{k: ["a", "b"]}` into `{k: "v"}` / `{k: "a\nb"}`.
///
/// Entries of any other shape are dropped; a non-object value yields an
/// empty map.
fn deserialize_characteristics<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(raw) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };

    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| normalize_characteristic(value).map(|v| (key, v)))
        .collect())
}

fn normalize_characteristic(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(CHARACTERISTIC_SEPARATOR)),
        _ => None,
    }
}

/// A page of products from the catalog search endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    #[serde(default)]
    pub total: u64,
}
