//! Inbound `cynapp://` URL dispatch.

use secrecy::SecretString;
use tracing::{debug, instrument};
use url::Url;

use crate::checkout::{CheckoutOrchestrator, CheckoutOutcome};
use crate::session::{Session, SessionError};

/// Custom scheme registered for the app.
pub const SCHEME: &str = "cynapp";

/// A deep link after parsing, before any side effects.
#[derive(Debug, Clone)]
pub enum DeepLink {
    /// `cynapp://auth?authToken=<jwt>`
    Auth { token: SecretString },
    /// `cynapp://checkout?...`
    Checkout(Url),
    /// Anything else (wrong scheme, unknown host, auth without a token).
    Unknown,
}

impl DeepLink {
    /// Classify an inbound URL.
    #[must_use]
    pub fn parse(url: &Url) -> Self {
        if url.scheme() != SCHEME {
            return Self::Unknown;
        }

        match url.host_str() {
            Some("auth") => url
                .query_pairs()
                .find(|(key, _)| key == "authToken")
                .map(|(_, value)| value.into_owned())
                .filter(|token| !token.is_empty())
                .map_or(Self::Unknown, |token| Self::Auth {
                    token: SecretString::from(token),
                }),
            Some("checkout") => Self::Checkout(url.clone()),
            _ => Self::Unknown,
        }
    }
}

/// What the router did with a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    LoggedIn,
    Checkout(CheckoutOutcome),
    Ignored,
}

/// Dispatches every inbound URL by host.
#[derive(Debug, Clone)]
pub struct DeepLinkRouter {
    session: Session,
    checkout: CheckoutOrchestrator,
}

impl DeepLinkRouter {
    /// Create a router over the session and checkout handlers.
    #[must_use]
    pub const fn new(session: Session, checkout: CheckoutOrchestrator) -> Self {
        Self { session, checkout }
    }

    /// Handle one inbound URL.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the login token cannot be stored.
    #[instrument(skip(self, url), fields(host = url.host_str().unwrap_or_default()))]
    pub async fn route(&self, url: &Url) -> Result<Routed, SessionError> {
        match DeepLink::parse(url) {
            DeepLink::Auth { token } => {
                self.session.complete_login(&token).await?;
                Ok(Routed::LoggedIn)
            }
            DeepLink::Checkout(url) => Ok(Routed::Checkout(self.checkout.handle_return(&url))),
            DeepLink::Unknown => {
                debug!(scheme = url.scheme(), "Ignoring deep link");
                Ok(Routed::Ignored)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn parse(url: &str) -> DeepLink {
        DeepLink::parse(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_auth_link_carries_token() {
        match parse("cynapp://auth?authToken=abc.def") {
            DeepLink::Auth { token } => assert_eq!(token.expose_secret(), "abc.def"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_auth_without_token_is_unknown() {
        assert!(matches!(parse("cynapp://auth"), DeepLink::Unknown));
        assert!(matches!(parse("cynapp://auth?authToken="), DeepLink::Unknown));
    }

    #[test]
    fn test_checkout_and_unknown_hosts() {
        assert!(matches!(
            parse("cynapp://checkout?success=true"),
            DeepLink::Checkout(_)
        ));
        assert!(matches!(parse("cynapp://profile"), DeepLink::Unknown));
        assert!(matches!(
            parse("https://checkout/?success=true"),
            DeepLink::Unknown
        ));
    }
}
