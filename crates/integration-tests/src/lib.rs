//! Integration tests for the Cynapp storefront client.
//!
//! The tests drive a real [`Storefront`] against [`FakeShop`], an in-memory
//! backend with its own cart, and a [`RecordingBrowser`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cynapp-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_mutations` - single-flight gate, refresh-after-mutate, failures
//! - `checkout_flow` - hosted checkout and the post-payment settle refresh
//! - `bootstrap` - snapshot seeding, offline start, persistence
//! - `deep_links` - login, logout and link dispatch
//! - `catalog_account` - catalog cache and account read paths
//!
//! # Controlling timing
//!
//! [`FakeShop::hold`] parks the next matching request after its response
//! has been computed, so a test can observe the client mid-flight and choose
//! when the response lands. Checkout tests run with a paused clock.

#![allow(clippy::missing_panics_doc)]

pub mod browser;
pub mod fixtures;
pub mod shop;

use std::sync::Arc;

use cynapp_storefront::Storefront;
use cynapp_storefront::cart::CartCoordinator;
use cynapp_storefront::config::StorefrontConfig;
use cynapp_storefront::deep_link::Routed;
use cynapp_storefront::store::{KeyValueStore, MemoryStore};
use url::Url;

pub use browser::RecordingBrowser;
pub use shop::{FakeShop, Hold, RecordedRequest, Route};

/// Backend origin used by every test.
pub const BASE_URL: &str = "https://shop.test/";

/// Token delivered by the auth deep link.
pub const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.test.token";

/// Configuration pointing at [`BASE_URL`] with default timings.
#[must_use]
pub fn config() -> StorefrontConfig {
    StorefrontConfig::new(Url::parse(BASE_URL).expect("valid base URL"))
}

/// Parse a URL literal.
#[must_use]
pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap_or_else(|e| panic!("invalid URL {raw}: {e}"))
}

/// A storefront wired to fakes.
pub struct TestApp {
    pub storefront: Storefront,
    pub shop: Arc<FakeShop>,
    pub browser: Arc<RecordingBrowser>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Fresh app: empty in-memory store, default shop.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Arc::new(FakeShop::default()), Arc::new(MemoryStore::new()))
    }

    /// App over an existing store, e.g. one left behind by a previous run.
    #[must_use]
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self::build(Arc::new(FakeShop::default()), store)
    }

    /// App sharing `shop` and `store`, as after a process restart.
    #[must_use]
    pub fn build(shop: Arc<FakeShop>, store: Arc<dyn KeyValueStore>) -> Self {
        let browser = Arc::new(RecordingBrowser::default());
        let storefront = Storefront::with_parts(config(), store, shop.clone(), browser.clone());
        Self {
            storefront,
            shop,
            browser,
        }
    }

    /// Logged-in app whose server cart holds `lines`, already refreshed.
    pub async fn logged_in(lines: &[(&str, u32)]) -> Self {
        let app = Self::new();
        app.shop.set_lines(lines);
        app.login().await;
        app
    }

    /// Deliver the auth deep link.
    pub async fn login(&self) {
        let link = url(&format!("cynapp://auth?authToken={TOKEN}"));
        let routed = self
            .storefront
            .router()
            .route(&link)
            .await
            .expect("auth link routes");
        assert_eq!(routed, Routed::LoggedIn);
    }

    /// The cart coordinator.
    #[must_use]
    pub fn cart(&self) -> &CartCoordinator {
        self.storefront.cart()
    }

    /// Displayed lines as `(product id, quantity)` pairs.
    #[must_use]
    pub fn displayed(&self) -> Vec<(String, u32)> {
        self.cart()
            .state()
            .lines()
            .iter()
            .map(|l| (l.product.id.to_string(), l.quantity))
            .collect()
    }
}
