//! Account dashboard commands.

use std::io::{self, BufRead};

use cynapp_core::{InvoiceId, OrderId, SubscriptionId};
use cynapp_storefront::Storefront;
use secrecy::SecretString;

use crate::error::CliError;
use crate::render;

pub async fn orders(storefront: &Storefront) -> Result<(), CliError> {
    let page = storefront.account().orders().await?;
    render::orders(&page);
    Ok(())
}

pub async fn order(storefront: &Storefront, id: &str) -> Result<(), CliError> {
    let order = storefront.account().order(&OrderId::new(id)).await?;
    render::order(&order, &storefront.config().locale);
    Ok(())
}

pub async fn invoice(storefront: &Storefront, id: &str) -> Result<(), CliError> {
    let url = storefront.account().invoice_url(&InvoiceId::new(id)).await?;
    render::message(&url);
    Ok(())
}

pub async fn subscriptions(storefront: &Storefront, id: Option<&str>) -> Result<(), CliError> {
    let account = storefront.account();
    match id {
        Some(id) => {
            let subscription = account.subscription(&SubscriptionId::new(id)).await?;
            render::subscription(&subscription, &storefront.config().locale);
        }
        None => render::subscriptions(&account.subscriptions().await?),
    }
    Ok(())
}

pub async fn profile(storefront: &Storefront) -> Result<(), CliError> {
    let profile = storefront.account().profile().await?;
    render::profile(&profile);
    Ok(())
}

/// Read current, new and confirmation passwords from stdin, one per line.
pub async fn password(storefront: &Storefront) -> Result<(), CliError> {
    render::message("Enter current password, new password and confirmation, one per line:");

    let (current, new, confirm) = {
        let mut lines = io::stdin().lock().lines();
        let mut next = || -> Result<SecretString, CliError> {
            let line = lines.next().transpose()?.unwrap_or_default();
            Ok(SecretString::from(line.trim_end_matches('\r').to_string()))
        };
        (next()?, next()?, next()?)
    };

    storefront
        .account()
        .change_password(&current, &new, &confirm)
        .await?;
    render::message("Password changed.");
    Ok(())
}
