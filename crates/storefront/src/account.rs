//! Signed-in account read paths and password change.
//!
//! Everything here requires a stored token.

use cynapp_core::{
    InvoiceId, InvoiceLink, Order, OrderId, OrderPage, Subscription, SubscriptionId,
    SubscriptionPage, UserProfile,
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, instrument};

use crate::http::{ApiClient, ApiError};
use crate::store::StoreError;

const ORDERS_PATH: &str = "api/user/dashboard/business/orders";
const INVOICES_PATH: &str = "api/user/dashboard/business/invoices";
const SUBSCRIPTIONS_PATH: &str = "api/user/dashboard/business/subscriptions";
const PROFILE_PATH: &str = "api/user/dashboard/profile";
const PASSWORD_PATH: &str = "api/user/dashboard/security/password";

/// Minimum length accepted for a new password.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Local validation failures for a password change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("Please enter your current password")]
    MissingCurrent,

    #[error("Please enter your new password")]
    MissingNew,

    #[error("New passwords do not match")]
    Mismatch,

    #[error("New password must be at least {MIN_PASSWORD_LENGTH} characters long")]
    TooShort,
}

/// Errors from account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("not logged in")]
    Unauthenticated,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AccountError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "You must be logged in".to_string(),
            Self::Password(e) => e.to_string(),
            Self::Api(e) => e.user_message(),
            Self::Store(_) => "Something went wrong".to_string(),
        }
    }
}

/// Check a password change form before sending it.
///
/// # Errors
///
/// Returns the first failing rule, in form order.
pub fn validate_password_change(
    current: &SecretString,
    new: &SecretString,
    confirm: &SecretString,
) -> Result<(), PasswordError> {
    let new = new.expose_secret();
    if current.expose_secret().is_empty() {
        return Err(PasswordError::MissingCurrent);
    }
    if new.is_empty() {
        return Err(PasswordError::MissingNew);
    }
    if new != confirm.expose_secret() {
        return Err(PasswordError::Mismatch);
    }
    if new.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    Ok(())
}

/// Client for the signed-in user's dashboard.
#[derive(Debug, Clone)]
pub struct Account {
    api: ApiClient,
}

impl Account {
    /// Create an account client.
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// The user's orders.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Unauthenticated` without a token, or `Api` on
    /// request failure.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<OrderPage, AccountError> {
        self.get(ORDERS_PATH, &[]).await
    }

    /// One order with its full detail.
    ///
    /// # Errors
    ///
    /// As [`orders`](Self::orders).
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order(&self, id: &OrderId) -> Result<Order, AccountError> {
        self.get(&format!("{ORDERS_PATH}/{id}"), &[]).await
    }

    /// A short-lived download URL for an invoice.
    ///
    /// # Errors
    ///
    /// As [`orders`](Self::orders).
    #[instrument(skip(self), fields(invoice_id = %id))]
    pub async fn invoice_url(&self, id: &InvoiceId) -> Result<String, AccountError> {
        let link: InvoiceLink = self.get(&format!("{INVOICES_PATH}/{id}"), &[]).await?;
        Ok(link.invoice_url)
    }

    /// The user's subscriptions (first hundred).
    ///
    /// # Errors
    ///
    /// As [`orders`](Self::orders).
    #[instrument(skip(self))]
    pub async fn subscriptions(&self) -> Result<SubscriptionPage, AccountError> {
        self.get(SUBSCRIPTIONS_PATH, &[("page", "0"), ("limit", "100")])
            .await
    }

    /// One subscription.
    ///
    /// # Errors
    ///
    /// As [`orders`](Self::orders).
    #[instrument(skip(self), fields(subscription_id = %id))]
    pub async fn subscription(&self, id: &SubscriptionId) -> Result<Subscription, AccountError> {
        self.get(&format!("{SUBSCRIPTIONS_PATH}/{id}"), &[]).await
    }

    /// The user's profile.
    ///
    /// # Errors
    ///
    /// As [`orders`](Self::orders).
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<UserProfile, AccountError> {
        self.get(PROFILE_PATH, &[]).await
    }

    /// Change the password after local validation.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Password` when the form is invalid (nothing is
    /// sent), `Unauthenticated` without a token, or `Api` when the server
    /// rejects the change.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current: &SecretString,
        new: &SecretString,
        confirm: &SecretString,
    ) -> Result<(), AccountError> {
        validate_password_change(current, new, confirm)?;
        self.require_token()?;

        let body = serde_json::json!({
            "currentPassword": current.expose_secret(),
            "newPassword": new.expose_secret(),
        });
        self.api
            .request_ok(crate::http::Method::Post, PASSWORD_PATH, &[], Some(body))
            .await?;

        info!("Password changed");
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AccountError> {
        self.require_token()?;
        Ok(self.api.get_json(path, query).await?)
    }

    fn require_token(&self) -> Result<(), AccountError> {
        if self.api.credentials().token()?.is_none() {
            return Err(AccountError::Unauthenticated);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::future::BoxFuture;
    use url::Url;

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::http::{ApiRequest, ApiResponse, Transport, TransportError};
    use crate::store::CredentialStore;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[test]
    fn test_password_rules_in_order() {
        let long = secret("correct-horse-battery");
        assert_eq!(
            validate_password_change(&secret(""), &long, &long),
            Err(PasswordError::MissingCurrent)
        );
        assert_eq!(
            validate_password_change(&secret("old"), &secret(""), &secret("")),
            Err(PasswordError::MissingNew)
        );
        assert_eq!(
            validate_password_change(&secret("old"), &long, &secret("correct-horse")),
            Err(PasswordError::Mismatch)
        );
        assert_eq!(
            validate_password_change(&secret("old"), &secret("short"), &secret("short")),
            Err(PasswordError::TooShort)
        );
        assert_eq!(validate_password_change(&secret("old"), &long, &long), Ok(()));
    }

    #[test]
    fn test_password_length_counts_characters() {
        let accented = secret("éééééééééééé");
        assert_eq!(
            validate_password_change(&secret("old"), &accented, &accented),
            Ok(())
        );
    }

    struct Recorder {
        requests: Mutex<Vec<ApiRequest>>,
        body: &'static str,
    }

    impl Transport for Recorder {
        fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>> {
            self.requests.lock().unwrap().push(request);
            let body = self.body.as_bytes().to_vec();
            Box::pin(async move { Ok(ApiResponse { status: 200, body }) })
        }
    }

    fn account(logged_in: bool, body: &'static str) -> (Account, Arc<Recorder>) {
        let transport = Arc::new(Recorder {
            requests: Mutex::new(Vec::new()),
            body,
        });
        let credentials = CredentialStore::in_memory();
        if logged_in {
            credentials.set_token(&secret("jwt")).unwrap();
        }
        let config = StorefrontConfig::new(Url::parse("https://shop.test/").unwrap());
        (
            Account::new(ApiClient::new(transport.clone(), &config, credentials)),
            transport,
        )
    }

    #[tokio::test]
    async fn test_requires_token() {
        let (account, transport) = account(false, "{}");
        assert!(matches!(
            account.profile().await,
            Err(AccountError::Unauthenticated)
        ));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invoice_url() {
        let (account, transport) = account(true, r#"{"invoiceUrl":"https://files.test/inv.pdf"}"#);
        let url = account.invoice_url(&InvoiceId::new("in_1")).await.unwrap();
        assert_eq!(url, "https://files.test/inv.pdf");
        assert_eq!(
            transport.requests.lock().unwrap()[0].url.as_str(),
            "https://shop.test/en/api/user/dashboard/business/invoices/in_1"
        );
    }

    #[tokio::test]
    async fn test_subscriptions_query() {
        let (account, transport) = account(true, r#"{"subscriptions":[],"total":0}"#);
        let page = account.subscriptions().await.unwrap();
        assert!(page.subscriptions.is_empty());
        assert_eq!(
            transport.requests.lock().unwrap()[0].url.query(),
            Some("page=0&limit=100")
        );
    }

    #[tokio::test]
    async fn test_change_password_posts_body() {
        let (account, transport) = account(true, r#"{"message":"ok"}"#);
        let new = secret("a-much-longer-password");
        account
            .change_password(&secret("old"), &new, &new)
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].method, crate::http::Method::Post);
        assert_eq!(
            requests[0].body.as_ref().unwrap(),
            &serde_json::json!({"currentPassword": "old", "newPassword": "a-much-longer-password"})
        );
    }

    #[tokio::test]
    async fn test_invalid_form_sends_nothing() {
        let (account, transport) = account(true, "{}");
        let err = account
            .change_password(&secret("old"), &secret("short"), &secret("short"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "New password must be at least 12 characters long");
        assert!(transport.requests.lock().unwrap().is_empty());
    }
}
