//! Login, logout and deep-link delivery.
//!
//! # Usage
//!
//! ```bash
//! cynapp login
//! cynapp open 'cynapp://auth?authToken=...'
//! cynapp logout
//! ```

use cynapp_storefront::Storefront;
use cynapp_storefront::deep_link::Routed;
use secrecy::SecretString;
use url::Url;

use crate::error::CliError;
use crate::render;

/// Open the login page, or store `token` as if the auth link arrived.
pub async fn login(storefront: &Storefront, token: Option<String>) -> Result<(), CliError> {
    match token {
        Some(token) => {
            storefront
                .session()
                .complete_login(&SecretString::from(token))
                .await?;
            render::message("Logged in.");
            render::cart(&storefront.cart().state(), &storefront.config().locale);
        }
        None => {
            storefront.session().begin_login()?;
            render::message("Then run: cynapp open '<the cynapp://auth link>'");
        }
    }
    Ok(())
}

/// Forget the session.
pub fn logout(storefront: &Storefront) -> Result<(), CliError> {
    storefront.session().logout()?;
    render::message("Logged out.");
    Ok(())
}

/// Route an inbound `cynapp://` URL.
pub async fn open(storefront: &Storefront, raw: &str) -> Result<(), CliError> {
    let url = Url::parse(raw)?;

    // Checkout returns act on the cart, so start from the stored one.
    storefront.session().start().await?;

    let routed = storefront.router().route(&url).await?;
    render::routed(&routed);

    if matches!(routed, Routed::Checkout(ref outcome) if outcome.is_success()) {
        render::cart(&storefront.cart().state(), &storefront.config().locale);
        storefront.checkout().wait_for_settle().await;
        render::message("Cart after payment:");
        render::cart(&storefront.cart().state(), &storefront.config().locale);
    }
    Ok(())
}
