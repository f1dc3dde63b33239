//! Login state and process bootstrap.
//!
//! The token is the only login state: present means logged in. It arrives
//! through the `cynapp://auth` deep link after the hosted login page and is
//! removed on logout.

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cart::CartCoordinator;
use crate::checkout::{BrowserError, ExternalBrowser};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::snapshot::CartSnapshotCache;
use crate::store::{CredentialStore, StoreError};

/// Whether a token is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoggedIn,
}

/// Errors from session transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid login URL: {0}")]
    InvalidLoginUrl(#[from] url::ParseError),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Login/logout and startup coordination.
///
/// Cheap to clone; clones share the auth channel.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    login_url: Result<Url, url::ParseError>,
    credentials: CredentialStore,
    snapshot: CartSnapshotCache,
    cart: CartCoordinator,
    browser: Arc<dyn ExternalBrowser>,
    auth: watch::Sender<AuthState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("auth", &*self.inner.auth.borrow())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session. The auth state starts from whether a token is
    /// already stored.
    #[must_use]
    pub fn new(
        login_url: Result<Url, url::ParseError>,
        credentials: CredentialStore,
        cart: CartCoordinator,
        browser: Arc<dyn ExternalBrowser>,
    ) -> Self {
        let initial = match credentials.token() {
            Ok(Some(_)) => AuthState::LoggedIn,
            _ => AuthState::LoggedOut,
        };
        let (auth, _) = watch::channel(initial);
        let snapshot = CartSnapshotCache::new(credentials.clone());

        Self {
            inner: Arc::new(SessionInner {
                login_url,
                credentials,
                snapshot,
                cart,
                browser,
                auth,
            }),
        }
    }

    /// Current auth state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        *self.inner.auth.borrow()
    }

    /// Receive login/logout transitions.
    #[must_use]
    pub fn subscribe_auth(&self) -> watch::Receiver<AuthState> {
        self.inner.auth.subscribe()
    }

    /// Process start: bootstrap the cart when a token is stored.
    ///
    /// Network failures during the initial refresh are not fatal; the
    /// snapshot stays visible.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the token cannot be read.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<AuthState, SessionError> {
        if self.inner.credentials.token()?.is_none() {
            info!("No stored token, starting logged out");
            self.inner.auth.send_replace(AuthState::LoggedOut);
            return Ok(AuthState::LoggedOut);
        }

        self.inner.auth.send_replace(AuthState::LoggedIn);
        if let Err(e) = self.inner.cart.bootstrap().await {
            warn!(error = %e, "Cart bootstrap incomplete, showing snapshot");
        }
        self.identify_user();
        Ok(AuthState::LoggedIn)
    }

    /// The hosted login page.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidLoginUrl` if the configured path is
    /// not a valid URL.
    pub fn login_url(&self) -> Result<Url, SessionError> {
        self.inner.login_url.clone().map_err(SessionError::from)
    }

    /// Open the hosted login page.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the URL is invalid or the browser fails.
    #[instrument(skip(self))]
    pub fn begin_login(&self) -> Result<Url, SessionError> {
        let url = self.login_url()?;
        self.inner.browser.open(&url)?;
        debug!(url = %url, "Opened login page");
        Ok(url)
    }

    /// Store the token from the auth deep link and load the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the token cannot be persisted.
    #[instrument(skip_all)]
    pub async fn complete_login(&self, token: &SecretString) -> Result<(), SessionError> {
        self.inner.credentials.set_token(token)?;
        self.inner.auth.send_replace(AuthState::LoggedIn);
        self.inner.browser.close();
        add_breadcrumb("auth", "Logged in", &[]);
        info!("Logged in");

        if let Err(e) = self.inner.cart.refresh().await {
            warn!(error = %e, "Cart refresh after login failed");
        }
        self.identify_user();
        Ok(())
    }

    /// Forget the token, cart id and snapshot and empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the store cannot be written.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<(), SessionError> {
        self.inner.credentials.clear_token()?;
        self.inner.credentials.clear_cart_id()?;
        self.inner.snapshot.clear()?;
        self.inner.cart.clear_lines();
        self.inner.auth.send_replace(AuthState::LoggedOut);
        clear_sentry_user();
        info!("Logged out");
        Ok(())
    }

    fn identify_user(&self) {
        let owner = self
            .inner
            .cart
            .state()
            .totals()
            .and_then(|t| t.owner.clone());
        if let Some(user_id) = owner {
            set_sentry_user(&user_id);
        }
    }
}
