//! The server-owned cart and the line items derived from it.
//!
//! The cart is authoritative on the backend: totals, tax, discount and
//! checkout eligibility are read-only here. The client only derives
//! [`CartLine`]s (one per product) for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CartId, Price, Product, ProductId, UserId};

/// A `(product, quantity)` pair shown to the user.
///
/// `quantity` is always at least 1, and a cart never holds two lines for the
/// same product id.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// Create a line; returns `None` for a zero quantity.
    #[must_use]
    pub fn new(product: Product, quantity: u32) -> Option<Self> {
        if quantity == 0 {
            None
        } else {
            Some(Self { product, quantity })
        }
    }

    /// The product id, which is also the line's identity.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product.id
    }

    /// `unit_price × quantity`, a display hint only.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// Local aggregation of `unit_price × quantity` over `lines`.
///
/// The server `total` is authoritative; this exists for display hints while
/// a refresh is pending.
#[must_use]
pub fn subtotal(lines: &[CartLine]) -> Price {
    lines.iter().map(CartLine::line_total).sum()
}

/// Billing cycle attached to a cart entry (`"monthly"`, `"annual"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillingCycle(String);

impl BillingCycle {
    /// Create from the raw wire value.
    #[must_use]
    pub fn new(cycle: impl Into<String>) -> Self {
        Self(cycle.into())
    }

    /// The raw wire value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the entry renews (monthly or annual).
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        matches!(self.0.as_str(), "monthly" | "annual" | "yearly")
    }
}

/// One product entry in the server cart payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEntry {
    pub product: Product,
    pub quantity: u32,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    #[serde(rename = "_id", default)]
    pub entry_id: Option<String>,
}

/// Checkout eligibility as decided by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutEligibility {
    pub is_eligible: bool,
    #[serde(default)]
    pub reason: String,
}

/// The server-authoritative cart (`GET en/api/shop/cart`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    pub id: CartId,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub products: Vec<CartEntry>,
    #[serde(default)]
    pub subtotal: Price,
    #[serde(default)]
    pub tax: Price,
    #[serde(default)]
    pub discount: Price,
    #[serde(default)]
    pub total: Price,
    #[serde(default)]
    pub checkout: CheckoutEligibility,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// Decode a cart from the raw response body.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload is not a cart.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Display lines, one per product, in server order.
    ///
    /// Entries with a zero quantity are skipped. If the server lists the same
    /// product twice (e.g. two billing cycles) the quantities are combined
    /// into the first line so that line identity stays unique.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        let mut lines: Vec<CartLine> = Vec::with_capacity(self.products.len());
        for entry in &self.products {
            if entry.quantity == 0 {
                continue;
            }
            if let Some(existing) = lines.iter_mut().find(|l| l.product.id == entry.product.id) {
                existing.quantity = existing.quantity.saturating_add(entry.quantity);
            } else {
                lines.push(CartLine {
                    product: entry.product.clone(),
                    quantity: entry.quantity,
                });
            }
        }
        lines
    }

    /// Total number of units across all entries.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.products.iter().map(|e| e.quantity).sum()
    }

    /// Whether the server reports no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    const CART_JSON: &str = r#"{
        "_id": "cart-1",
        "user": "user-1",
        "products": [
            {"product": {"_id": "A", "price": 10}, "quantity": 2, "billingCycle": "monthly", "_id": "e1"},
            {"product": {"_id": "B", "price": 2.5}, "quantity": 1, "billingCycle": "oneTime", "_id": "e2"}
        ],
        "subtotal": 22.5, "tax": 4.5, "discount": 0, "total": 27,
        "checkout": {"isEligible": true, "reason": ""},
        "createdAt": "2025-04-10T12:00:00.000Z",
        "updatedAt": "2025-04-10T12:05:00.000Z",
        "__v": 3
    }"#;

    #[test]
    fn test_cart_decodes() {
        let cart = Cart::from_slice(CART_JSON.as_bytes()).unwrap();
        assert_eq!(cart.id.as_str(), "cart-1");
        assert_eq!(cart.user, Some(UserId::new("user-1")));
        assert_eq!(cart.total, Price::new(Decimal::from(27)));
        assert!(cart.checkout.is_eligible);
        assert!(cart.products[0].billing_cycle.is_recurring());
        assert!(!cart.products[1].billing_cycle.is_recurring());
        assert_eq!(cart.item_count(), 3);
        assert!(cart.created_at.is_some());
    }

    #[test]
    fn test_lines_and_local_subtotal() {
        let cart = Cart::from_slice(CART_JSON.as_bytes()).unwrap();
        let lines = cart.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id().as_str(), "A");
        assert_eq!(lines[0].line_total(), Price::new(Decimal::from(20)));
        assert_eq!(subtotal(&lines), Price::new(Decimal::new(225, 1)));
    }

    #[test]
    fn test_duplicate_products_collapse_into_one_line() {
        let cart = Cart::from_slice(
            br#"{"_id": "c", "products": [
                {"product": {"_id": "A"}, "quantity": 1},
                {"product": {"_id": "B"}, "quantity": 0},
                {"product": {"_id": "A"}, "quantity": 2}
            ]}"#,
        )
        .unwrap();

        let lines = cart.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from_slice(br#"{"_id": "c", "products": []}"#).unwrap();
        assert!(cart.is_empty());
        assert!(cart.lines().is_empty());
        assert!(subtotal(&cart.lines()).is_zero());
    }

    #[test]
    fn test_zero_quantity_line_is_rejected() {
        let product: Product = serde_json::from_str(r#"{"_id": "A"}"#).unwrap();
        assert!(CartLine::new(product.clone(), 0).is_none());
        assert_eq!(CartLine::new(product, 2).unwrap().quantity, 2);
    }
}
