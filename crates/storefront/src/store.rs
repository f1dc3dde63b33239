//! Durable key/value storage for credentials and the cart snapshot.
//!
//! # Architecture
//!
//! - [`KeyValueStore`] is the three-method seam (`get`/`set`/`delete`) the
//!   rest of the client depends on. Tests inject [`MemoryStore`].
//! - [`FileStore`] persists one file per key and replaces it atomically
//!   (write to a temp file, then rename), so readers always see a whole
//!   record.
//! - [`CredentialStore`] is the typed view used by the client: bearer
//!   token, last-known cart id and the raw cart bytes.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use cynapp_core::CartId;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Well-known keys persisted by the client.
pub mod keys {
    /// Bearer token from the hosted login flow.
    pub const AUTH_TOKEN: &str = "authToken";

    /// Id of the most recently fetched server cart.
    pub const CART_ID: &str = "cartId";

    /// Raw bytes of the most recent successful cart response.
    pub const CART: &str = "cart";
}

/// Errors raised by a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("store I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    /// A stored value was expected to be UTF-8 text.
    #[error("stored value for {0} is not valid UTF-8")]
    NotUtf8(String),

    /// The in-memory lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// A durable string-keyed byte store.
///
/// Writes are synchronous from the caller's perspective; a read observes the
/// last committed write.
pub trait KeyValueStore: Send + Sync {
    /// Read the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`; removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Process-local store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// One file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the key files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let target = self.path_for(key);
        let staging = self.dir.join(format!(".{key}.tmp"));
        let io_err = |source| StoreError::Io {
            key: key.to_owned(),
            source,
        };

        fs::write(&staging, value).map_err(io_err)?;
        fs::rename(&staging, &target).map_err(io_err)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }
}

// =============================================================================
// CredentialStore
// =============================================================================

/// Typed access to the persisted token, cart id and cart bytes.
///
/// Cheaply cloneable; all clones share one backing store.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Wrap a backing store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// In-memory credentials, mostly for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// The bearer token, if logged in.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn token(&self) -> Result<Option<SecretString>, StoreError> {
        Ok(self
            .get_string(keys::AUTH_TOKEN)?
            .filter(|t| !t.is_empty())
            .map(SecretString::from))
    }

    /// Persist the bearer token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn set_token(&self, token: &SecretString) -> Result<(), StoreError> {
        self.store
            .set(keys::AUTH_TOKEN, token.expose_secret().as_bytes())
    }

    /// Forget the bearer token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn clear_token(&self) -> Result<(), StoreError> {
        self.store.delete(keys::AUTH_TOKEN)
    }

    /// The last-known cart id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn cart_id(&self) -> Result<Option<CartId>, StoreError> {
        Ok(self
            .get_string(keys::CART_ID)?
            .filter(|id| !id.is_empty())
            .map(CartId::new))
    }

    /// Record the cart id from the latest server response.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn set_cart_id(&self, cart_id: &CartId) -> Result<(), StoreError> {
        self.store.set(keys::CART_ID, cart_id.as_str().as_bytes())
    }

    /// Forget the cart id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn clear_cart_id(&self) -> Result<(), StoreError> {
        self.store.delete(keys::CART_ID)
    }

    /// Persist the raw cart response bytes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn save_cart_bytes(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.store.set(keys::CART, bytes)
    }

    /// Read back the raw cart response bytes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn load_cart_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(keys::CART)
    }

    /// Forget the raw cart response bytes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be written.
    pub fn clear_cart_bytes(&self) -> Result<(), StoreError> {
        self.store.delete(keys::CART)
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store
            .get(key)?
            .map(|bytes| String::from_utf8(bytes).map_err(|_| StoreError::NotUtf8(key.to_owned())))
            .transpose()
    }
}
