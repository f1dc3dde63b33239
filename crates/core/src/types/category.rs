//! Catalog categories.

use serde::{Deserialize, Serialize};

use super::{CategoryId, LocalizedText};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: CategoryId,
    #[serde(default)]
    pub label: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(rename = "picture", default)]
    pub image_url: String,
}

const fn default_active() -> bool {
    true
}

/// A page of categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryPage {
    pub categories: Vec<Category>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub size: u64,
}
