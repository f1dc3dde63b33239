//! Account records: orders, invoices, subscriptions and the user profile.
//!
//! These are read-only projections of backend state. Fields the backend
//! omits on older documents are optional or defaulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InvoiceId, OrderId, Price, Product, ProductId, SubscriptionId, UserId};

// =============================================================================
// Orders
// =============================================================================

/// Minimal user reference embedded in orders and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// A purchased product line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProduct {
    #[serde(rename = "productId")]
    pub product: Product,
    pub quantity: u32,
    #[serde(default)]
    pub billing_cycle: String,
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub total_tax: Price,
}

/// Payment details recorded by the payment provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripePayment {
    #[serde(default)]
    pub amount_total: Price,
    #[serde(default)]
    pub amount_subtotal: Price,
    #[serde(default)]
    pub amount_tax: Price,
    #[serde(default)]
    pub amount_discount: Price,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub voucher_code: Option<String>,
    #[serde(default)]
    pub invoice_id: Option<InvoiceId>,
    #[serde(default)]
    pub subscription_id: Option<String>,
}

/// One entry in an order or subscription status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: String,
    #[serde(default)]
    pub updated_by: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
}

/// Billing address captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

/// A past order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    /// Human-facing order number, also returned by the checkout deep link.
    #[serde(default)]
    pub short_id: Option<String>,
    #[serde(default)]
    pub user: Option<OrderUser>,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub products: Vec<OrderProduct>,
    #[serde(default)]
    pub stripe: StripePayment,
    #[serde(default)]
    pub order_status: String,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    #[serde(default)]
    pub billing_address: Option<BillingAddress>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Short id when present, otherwise the full id.
    #[must_use]
    pub fn display_id(&self) -> &str {
        self.short_id.as_deref().unwrap_or_else(|| self.id.as_str())
    }

    /// Invoice id recorded by the payment provider, if any.
    #[must_use]
    pub const fn invoice_id(&self) -> Option<&InvoiceId> {
        self.stripe.invoice_id.as_ref()
    }
}

/// `GET .../business/orders` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    #[serde(default)]
    pub total: u64,
}

/// `GET .../business/invoices/<id>` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLink {
    pub invoice_url: String,
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Provider-side subscription state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSubscription {
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub canceled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latest_invoice_id: Option<InvoiceId>,
}

/// Quantity as tracked by the provider for one subscription item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSubscriptionItem {
    #[serde(default)]
    pub quantity: u32,
}

/// A product within a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionItem {
    #[serde(rename = "productId")]
    pub product: Product,
    #[serde(default)]
    pub billing_cycle: String,
    #[serde(default)]
    pub stripe: StripeSubscriptionItem,
}

/// The order a subscription was created from, as embedded by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOrder {
    #[serde(rename = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub short_id: Option<String>,
    #[serde(default)]
    pub stripe: StripePayment,
}

/// A recurring subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(rename = "_id")]
    pub id: SubscriptionId,
    #[serde(default)]
    pub short_id: Option<String>,
    #[serde(default)]
    pub stripe: StripeSubscription,
    #[serde(default)]
    pub user_email: String,
    #[serde(rename = "orderId", default)]
    pub order: Option<SubscriptionOrder>,
    #[serde(default)]
    pub items: Vec<SubscriptionItem>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Whether the provider still considers the subscription live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.stripe.status.as_str(), "active" | "trialing")
    }

    /// Product ids covered by this subscription.
    pub fn product_ids(&self) -> impl Iterator<Item = &ProductId> {
        self.items.iter().map(|item| &item.product.id)
    }
}

/// `GET .../business/subscriptions` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionPage {
    pub subscriptions: Vec<Subscription>,
    #[serde(default)]
    pub total: u64,
}

// =============================================================================
// Profile
// =============================================================================

/// Postal address on a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

/// The signed-in user's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub is_confirmed: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// `"First Last"`, trimmed when either part is missing.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}
