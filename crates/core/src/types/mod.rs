//! Core types for Cynapp.
//!
//! Wire records mirror the backend JSON (camelCase, Mongo-style `_id`) and
//! normalize the loose parts of the payload while decoding.

pub mod account;
pub mod cart;
pub mod category;
pub mod id;
pub mod localized;
pub mod price;
pub mod product;

pub use account::{
    Address, BillingAddress, InvoiceLink, Order, OrderPage, OrderProduct, OrderUser,
    StatusChange, StripePayment, StripeSubscription, StripeSubscriptionItem, Subscription,
    SubscriptionItem, SubscriptionOrder, SubscriptionPage, UserProfile,
};
pub use cart::{BillingCycle, Cart, CartEntry, CartLine, CheckoutEligibility, subtotal};
pub use category::{Category, CategoryPage};
pub use id::*;
pub use localized::{DEFAULT_LOCALE, LocalizedText};
pub use price::Price;
pub use product::{Product, ProductPage};
