//! Client state shared by every front end.

use std::sync::Arc;

use crate::account::Account;
use crate::cart::CartCoordinator;
use crate::catalog::Catalog;
use crate::checkout::{CheckoutOrchestrator, ExternalBrowser};
use crate::config::StorefrontConfig;
use crate::deep_link::DeepLinkRouter;
use crate::error::StorefrontError;
use crate::http::{ApiClient, ReqwestTransport, Transport};
use crate::session::Session;
use crate::snapshot::CartSnapshotCache;
use crate::store::{CredentialStore, FileStore, KeyValueStore};

/// Every storefront component, wired together.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    credentials: CredentialStore,
    api: ApiClient,
    cart: CartCoordinator,
    checkout: CheckoutOrchestrator,
    session: Session,
    router: DeepLinkRouter,
    catalog: Catalog,
    account: Account,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("base_url", &self.inner.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Build the production client: file-backed store under
    /// `config.data_dir` and a `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the HTTP
    /// client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        browser: Arc<dyn ExternalBrowser>,
    ) -> Result<Self, StorefrontError> {
        let store = FileStore::open(&config.data_dir)?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_parts(
            config,
            Arc::new(store),
            Arc::new(transport),
            browser,
        ))
    }

    /// Build a client from explicit parts (tests inject fakes here).
    #[must_use]
    pub fn with_parts(
        config: StorefrontConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
        browser: Arc<dyn ExternalBrowser>,
    ) -> Self {
        let credentials = CredentialStore::new(store);
        let api = ApiClient::new(transport, &config, credentials.clone());
        let cart = CartCoordinator::new(api.clone(), CartSnapshotCache::new(credentials.clone()));
        let checkout = CheckoutOrchestrator::new(
            api.clone(),
            cart.clone(),
            Arc::clone(&browser),
            config.checkout_settle_delay,
        );
        let session = Session::new(config.login_url(), credentials.clone(), cart.clone(), browser);
        let router = DeepLinkRouter::new(session.clone(), checkout.clone());
        let catalog = Catalog::new(api.clone(), config.catalog_cache_ttl);
        let account = Account::new(api.clone());

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                credentials,
                api,
                cart,
                checkout,
                session,
                router,
                catalog,
                account,
            }),
        }
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Persisted token and cart id.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// Raw API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Cart coordinator.
    #[must_use]
    pub fn cart(&self) -> &CartCoordinator {
        &self.inner.cart
    }

    /// Hosted checkout.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }

    /// Login state and bootstrap.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Inbound deep-link dispatch.
    #[must_use]
    pub fn router(&self) -> &DeepLinkRouter {
        &self.inner.router
    }

    /// Product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Signed-in account.
    #[must_use]
    pub fn account(&self) -> &Account {
        &self.inner.account
    }
}
