//! Cynapp storefront client library.
//!
//! Coordinates a server-owned shopping cart, hosted checkout, deep-link
//! login and the catalog/account read paths of the Cynapp shop backend.
//! Front ends build a [`Storefront`] and subscribe to its cart state.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod deep_link;
pub mod error;
pub mod http;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod store;

pub use error::{Result, StorefrontError};
pub use state::Storefront;
