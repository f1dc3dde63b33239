//! Catalog browsing.

use cynapp_storefront::Storefront;
use cynapp_storefront::catalog::products_by_category;

use crate::error::CliError;
use crate::render;

/// List products, flat or grouped by category.
pub async fn products(
    storefront: &Storefront,
    query: Option<&str>,
    page: u32,
    limit: u32,
    grouped: bool,
) -> Result<(), CliError> {
    let catalog = storefront.catalog();
    let locale = &storefront.config().locale;
    let listing = catalog.products(query, page, limit).await?;

    if grouped {
        let categories = catalog.categories_by_id().await?;
        render::grouped(&products_by_category(listing.products), &categories, locale);
    } else {
        render::products(&listing, locale);
    }
    Ok(())
}

/// List active categories.
pub async fn categories(storefront: &Storefront) -> Result<(), CliError> {
    let categories = storefront.catalog().categories().await?;
    render::categories(&categories, &storefront.config().locale);
    Ok(())
}
