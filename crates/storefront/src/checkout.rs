//! Hosted checkout.
//!
//! [`CheckoutOrchestrator::begin`] asks the backend for a hosted payment
//! page and opens it through an [`ExternalBrowser`]. The payment provider
//! sends the user back with a `cynapp://checkout?...` deep link, which the
//! router hands to [`CheckoutOrchestrator::handle_return`].
//!
//! On success the cart lines are emptied at once and the cart is re-read
//! after a settle delay, because the server finalizes the cart
//! asynchronously after payment.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cart::CartCoordinator;
use crate::http::{ApiClient, ApiError, Method, decode};
use crate::store::StoreError;

const CHECKOUT_PATH: &str = "api/shop/checkout";
const DEFAULT_INELIGIBLE_MESSAGE: &str = "Unable to proceed further";

/// Order id shown when the provider omits it.
pub const UNKNOWN_ORDER_ID: &str = "-";

// =============================================================================
// Browser Capability
// =============================================================================

/// Failure to hand a URL to the browser.
#[derive(Debug, Error)]
#[error("failed to open browser: {0}")]
pub struct BrowserError(pub String);

/// An in-app or system browser used for login and hosted checkout.
pub trait ExternalBrowser: Send + Sync {
    /// Show `url`.
    ///
    /// # Errors
    ///
    /// Returns `BrowserError` if the URL cannot be shown.
    fn open(&self, url: &Url) -> Result<(), BrowserError>;

    /// Dismiss whatever page is showing. No-op if nothing is open.
    fn close(&self);
}

// =============================================================================
// Types
// =============================================================================

/// Hosted checkout session returned by the backend. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub can_checkout: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// How the hosted checkout ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Success { order_id: String },
    UserCancelled,
    Failed { message: String },
}

impl CheckoutOutcome {
    /// Decode a return URL's query.
    ///
    /// `success=true` wins over `userCancel=true`; anything else is a failure.
    #[must_use]
    pub fn from_return_url(url: &Url) -> Self {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if param("success").as_deref() == Some("true") {
            Self::Success {
                order_id: param("orderId").unwrap_or_else(|| UNKNOWN_ORDER_ID.to_string()),
            }
        } else if param("userCancel").as_deref() == Some("true") {
            Self::UserCancelled
        } else {
            Self::Failed {
                message: "payment failed".to_string(),
            }
        }
    }

    /// Whether payment went through.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl fmt::Display for CheckoutOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { order_id } => write!(f, "Successfully paid! Order no. {order_id}"),
            Self::UserCancelled => f.write_str("Payment cancelled."),
            Self::Failed { message } => write!(f, "Payment failed: {message}"),
        }
    }
}

/// Errors from starting a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("not logged in")]
    Unauthenticated,

    /// The server refused to start checkout.
    #[error("checkout not possible: {0}")]
    Ineligible(String),

    /// The session URL could not be parsed.
    #[error("invalid checkout URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please log in to check out".to_string(),
            Self::Ineligible(reason) => reason.clone(),
            Self::Api(e) => e.user_message(),
            Self::InvalidUrl(_) | Self::Browser(_) | Self::Store(_) => {
                "Unable to open the payment page".to_string()
            }
        }
    }
}

// =============================================================================
// CheckoutOrchestrator
// =============================================================================

/// Starts hosted checkouts and reconciles the cart when they return.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    api: ApiClient,
    cart: CartCoordinator,
    browser: Arc<dyn ExternalBrowser>,
    settle_delay: Duration,
    settle_task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("settle_delay", &self.inner.settle_delay)
            .finish_non_exhaustive()
    }
}

impl CheckoutOrchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        api: ApiClient,
        cart: CartCoordinator,
        browser: Arc<dyn ExternalBrowser>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                api,
                cart,
                browser,
                settle_delay,
                settle_task: Mutex::new(None),
            }),
        }
    }

    /// Request a hosted checkout session and open it.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Unauthenticated` without a token,
    /// `Ineligible` when the server reports `canCheckout: false`, and
    /// `Api` for transport, status or decode failures (server messages are
    /// kept verbatim).
    #[instrument(skip(self))]
    pub async fn begin(&self) -> Result<CheckoutSession, CheckoutError> {
        if self.inner.api.credentials().token()?.is_none() {
            return Err(CheckoutError::Unauthenticated);
        }

        let response = self
            .inner
            .api
            .request_ok(
                Method::Post,
                CHECKOUT_PATH,
                &[("appMobileCheckout", "true")],
                Some(serde_json::json!({})),
            )
            .await?;
        let session: CheckoutSession = decode(CHECKOUT_PATH, &response.body)?;

        if !session.can_checkout {
            let reason = session
                .message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| self.ineligible_reason());
            warn!(reason = %reason, "Checkout refused by server");
            return Err(CheckoutError::Ineligible(reason));
        }

        let url = Url::parse(&session.url)
            .map_err(|e| CheckoutError::InvalidUrl(format!("{}: {e}", session.url)))?;
        self.inner.browser.open(&url)?;
        info!(host = url.host_str().unwrap_or_default(), "Opened hosted checkout");

        Ok(session)
    }

    /// Interpret the provider's return URL and reconcile the cart.
    ///
    /// On success the lines are emptied immediately and a refresh is
    /// scheduled after the settle delay.
    #[instrument(skip(self), fields(url = %url))]
    pub fn handle_return(&self, url: &Url) -> CheckoutOutcome {
        let outcome = CheckoutOutcome::from_return_url(url);
        self.inner.browser.close();

        match &outcome {
            CheckoutOutcome::Success { order_id } => {
                info!(order_id = %order_id, "Checkout succeeded");
                self.inner.cart.clear_lines();
                self.schedule_settle_refresh();
            }
            CheckoutOutcome::UserCancelled => info!("Checkout cancelled by user"),
            CheckoutOutcome::Failed { message } => warn!(message = %message, "Checkout failed"),
        }

        outcome
    }

    /// Wait for a pending post-checkout refresh, if any.
    pub async fn wait_for_settle(&self) {
        let task = self
            .inner
            .settle_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Post-checkout refresh task failed");
        }
    }

    /// Whether a post-checkout refresh is still pending.
    #[must_use]
    pub fn settle_pending(&self) -> bool {
        self.inner
            .settle_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn schedule_settle_refresh(&self) {
        let cart = self.inner.cart.clone();
        let credentials = self.inner.api.credentials().clone();
        let delay = self.inner.settle_delay;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !matches!(credentials.token(), Ok(Some(_))) {
                debug!("Logged out since checkout, skipping cart refresh");
                return;
            }
            debug!(?delay, "Refreshing cart after checkout");
            // Failures are published as notices by the coordinator.
            let _ = cart.refresh().await;
        });

        let previous = self
            .inner
            .settle_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn ineligible_reason(&self) -> String {
        self.inner
            .cart
            .state()
            .totals()
            .map(|t| t.checkout.reason.clone())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_INELIGIBLE_MESSAGE.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn outcome(url: &str) -> CheckoutOutcome {
        CheckoutOutcome::from_return_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_success_with_order_id() {
        assert_eq!(
            outcome("cynapp://checkout?success=true&orderId=ORD-9"),
            CheckoutOutcome::Success {
                order_id: "ORD-9".to_string()
            }
        );
    }

    #[test]
    fn test_success_without_order_id_defaults() {
        assert_eq!(
            outcome("cynapp://checkout?success=true"),
            CheckoutOutcome::Success {
                order_id: "-".to_string()
            }
        );
    }

    #[test]
    fn test_success_wins_over_cancel() {
        assert!(outcome("cynapp://checkout?userCancel=true&success=true").is_success());
    }

    #[test]
    fn test_cancel_and_failure() {
        assert_eq!(
            outcome("cynapp://checkout?userCancel=true"),
            CheckoutOutcome::UserCancelled
        );
        assert!(matches!(
            outcome("cynapp://checkout?success=false"),
            CheckoutOutcome::Failed { .. }
        ));
        assert!(matches!(
            outcome("cynapp://checkout?userCancel=TRUE"),
            CheckoutOutcome::Failed { .. }
        ));
        assert!(matches!(outcome("cynapp://checkout"), CheckoutOutcome::Failed { .. }));
    }

    #[test]
    fn test_session_decoding() {
        let session: CheckoutSession =
            serde_json::from_str(r#"{"url":"https://pay.test/s/1","canCheckout":true}"#).unwrap();
        assert!(session.can_checkout);
        assert!(session.message.is_none());
    }

    #[test]
    fn test_outcome_display() {
        let success = CheckoutOutcome::Success {
            order_id: "ORD-9".to_string(),
        };
        assert!(success.to_string().contains("ORD-9"));
        assert_eq!(CheckoutOutcome::UserCancelled.to_string(), "Payment cancelled.");
    }
}
