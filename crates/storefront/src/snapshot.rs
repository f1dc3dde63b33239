//! Last-known-good cart snapshot.
//!
//! The snapshot is the verbatim body of the most recent successful
//! `GET cart`, stored under [`keys::CART`](crate::store::keys::CART). It is
//! written through on every successful refresh and read once at bootstrap so
//! the cart can be shown before (or without) the network.

use cynapp_core::Cart;
use tracing::warn;

use crate::store::{CredentialStore, StoreError};

/// A decoded snapshot together with the bytes it came from.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub bytes: Vec<u8>,
    pub cart: Cart,
}

/// Write-through cache of the last cart response.
#[derive(Debug, Clone)]
pub struct CartSnapshotCache {
    credentials: CredentialStore,
}

impl CartSnapshotCache {
    /// Create a cache over the credential store.
    #[must_use]
    pub const fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }

    /// Store `bytes` verbatim.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn save(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.credentials.save_cart_bytes(bytes)
    }

    /// The stored bytes, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.credentials.load_cart_bytes()
    }

    /// The stored snapshot, decoded.
    ///
    /// Bytes that no longer decode as a cart are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn load_cart(&self) -> Result<Option<CartSnapshot>, StoreError> {
        let Some(bytes) = self.load()? else {
            return Ok(None);
        };

        match Cart::from_slice(&bytes) {
            Ok(cart) => Ok(Some(CartSnapshot { bytes, cart })),
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "Discarding undecodable cart snapshot");
                Ok(None)
            }
        }
    }

    /// Drop the snapshot (logout).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.credentials.clear_cart_bytes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_is_verbatim() {
        let cache = CartSnapshotCache::new(CredentialStore::in_memory());
        let body = br#"{"_id": "c1",  "products": []}"#;
        cache.save(body).unwrap();

        assert_eq!(cache.load().unwrap().as_deref(), Some(&body[..]));
        let snapshot = cache.load_cart().unwrap().unwrap();
        assert_eq!(snapshot.bytes, body.to_vec());
        assert_eq!(snapshot.cart.id.as_str(), "c1");
    }

    #[test]
    fn test_corrupt_bytes_read_as_absent() {
        let cache = CartSnapshotCache::new(CredentialStore::in_memory());
        cache.save(b"{not json").unwrap();
        assert!(cache.load_cart().unwrap().is_none());
    }

    #[test]
    fn test_clear() {
        let cache = CartSnapshotCache::new(CredentialStore::in_memory());
        cache.save(br#"{"_id": "c1"}"#).unwrap();
        cache.clear().unwrap();
        assert!(cache.load().unwrap().is_none());
    }
}
