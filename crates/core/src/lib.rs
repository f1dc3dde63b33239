//! Cynapp Core - Shared wire and domain types.
//!
//! This crate provides the records exchanged with the Cynapp shop backend:
//! - products and categories (catalog)
//! - the server-owned cart and its lines
//! - orders, subscriptions and the user profile (account)
//!
//! # Architecture
//!
//! The core crate contains only types and decoding rules - no I/O, no HTTP
//! clients, no persistence. The backend is authoritative for every monetary
//! aggregate; the helpers here only derive display hints.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices, and the decoded API records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
