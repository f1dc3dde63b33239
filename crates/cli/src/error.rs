//! CLI error type.

use cynapp_storefront::StorefrontError;
use cynapp_storefront::account::AccountError;
use cynapp_storefront::cart::CartError;
use cynapp_storefront::checkout::CheckoutError;
use cynapp_storefront::http::ApiError;
use cynapp_storefront::session::SessionError;
use cynapp_storefront::store::StoreError;
use thiserror::Error;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// The product is neither in the cart nor in the catalog.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// A deep link argument did not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Reading interactive input failed.
    #[error("Input error: {0}")]
    Input(#[from] std::io::Error),
}

impl CliError {
    /// Text for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Storefront(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// Send internal failures to Sentry.
    pub fn report(&self) {
        match self {
            Self::Storefront(e) => e.report(),
            other => tracing::warn!(error = %other, "Command failed"),
        }
    }
}

macro_rules! via_storefront {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CliError {
                fn from(e: $ty) -> Self {
                    Self::Storefront(e.into())
                }
            }
        )*
    };
}

via_storefront!(
    AccountError,
    ApiError,
    CartError,
    CheckoutError,
    SessionError,
    StoreError,
);
