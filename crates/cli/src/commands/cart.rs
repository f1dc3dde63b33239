//! Cart and checkout commands.
//!
//! Every command starts the session first, so the cart is seeded from the
//! snapshot and refreshed when a token is stored.

use cynapp_core::{Product, ProductId};
use cynapp_storefront::Storefront;
use cynapp_storefront::cart::{CartError, Mutation, Notice};
use tokio::sync::broadcast::Receiver;

use crate::error::CliError;
use crate::render;

const LOOKUP_PAGE_SIZE: u32 = 100;

/// Print the cart.
pub async fn show(storefront: &Storefront) -> Result<(), CliError> {
    let mut notices = storefront.cart().notices();
    storefront.session().start().await?;
    render::notices(&drain(&mut notices));
    render::cart(&storefront.cart().state(), &storefront.config().locale);
    Ok(())
}

/// Re-read the cart, failing loudly if the server is unreachable.
pub async fn refresh(storefront: &Storefront) -> Result<(), CliError> {
    storefront.cart().refresh().await?;
    render::cart(&storefront.cart().state(), &storefront.config().locale);
    Ok(())
}

/// Add `quantity` units in one request.
pub async fn add(storefront: &Storefront, product_id: &str, quantity: u32) -> Result<(), CliError> {
    let mut notices = storefront.cart().notices();
    storefront.session().start().await?;
    let product = find_product(storefront, product_id).await?;

    let outcome = storefront.cart().add_from_details(&product, quantity).await;
    finish(storefront, &mut notices, outcome)
}

/// Apply a `+1` or `-1` tap.
pub async fn step(storefront: &Storefront, product_id: &str, delta: i32) -> Result<(), CliError> {
    let mut notices = storefront.cart().notices();
    storefront.session().start().await?;
    let product = find_product(storefront, product_id).await?;

    let outcome = storefront.cart().apply_delta(&product, delta).await;
    finish(storefront, &mut notices, outcome)
}

/// Remove a line.
pub async fn remove(storefront: &Storefront, product_id: &str) -> Result<(), CliError> {
    let mut notices = storefront.cart().notices();
    storefront.session().start().await?;
    let product = find_product(storefront, product_id).await?;

    let outcome = storefront.cart().remove(&product).await;
    finish(storefront, &mut notices, outcome)
}

/// Start a hosted checkout.
pub async fn checkout(storefront: &Storefront) -> Result<(), CliError> {
    storefront.session().start().await?;
    storefront.checkout().begin().await?;
    render::message("Then run: cynapp open '<the cynapp://checkout link>'");
    Ok(())
}

fn finish(
    storefront: &Storefront,
    notices: &mut Receiver<Notice>,
    outcome: Result<Mutation, CartError>,
) -> Result<(), CliError> {
    let pending = drain(notices);
    match outcome {
        Ok(Mutation::Confirmed) => {
            render::notices(&pending);
            render::cart(&storefront.cart().state(), &storefront.config().locale);
            Ok(())
        }
        Ok(Mutation::NoOp) => {
            render::message("Nothing to change.");
            Ok(())
        }
        Ok(Mutation::Dropped) => {
            render::message("Another change for this product is still in progress.");
            Ok(())
        }
        // The error itself is rendered by main.
        Err(e) => Err(e.into()),
    }
}

/// Look the product up in the cart first, then in the catalog.
async fn find_product(storefront: &Storefront, product_id: &str) -> Result<Product, CliError> {
    let id = ProductId::new(product_id);
    if let Some(line) = storefront.cart().state().line(&id) {
        return Ok(line.product.clone());
    }

    let mut page = 0;
    loop {
        let listing = storefront
            .catalog()
            .products(None, page, LOOKUP_PAGE_SIZE)
            .await?;
        if let Some(product) = listing.products.iter().find(|p| p.id == id) {
            return Ok(product.clone());
        }

        let seen = u64::from(page + 1) * u64::from(LOOKUP_PAGE_SIZE);
        if listing.products.is_empty() || seen >= listing.total {
            return Err(CliError::UnknownProduct(product_id.to_string()));
        }
        page += 1;
    }
}

fn drain(notices: &mut Receiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        out.push(notice);
    }
    out
}
