//! Plain-text rendering of storefront data.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::HashMap;

use cynapp_core::{
    Category, CategoryId, CategoryPage, Order, OrderPage, ProductPage, Subscription,
    SubscriptionPage, UserProfile,
};
use cynapp_storefront::cart::{CartState, Notice};
use cynapp_storefront::catalog::CategoryGroup;
use cynapp_storefront::checkout::CheckoutOutcome;
use cynapp_storefront::deep_link::Routed;
use url::Url;

pub fn failure(message: &str) {
    eprintln!("error: {message}");
}

pub fn message(message: &str) {
    println!("{message}");
}

pub fn open_url(url: &Url) {
    println!("Open this page to continue:\n  {url}");
}

pub fn cart(state: &CartState, locale: &str) {
    if state.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for line in state.lines() {
        let marker = if state.is_updating(&line.product.id) { "*" } else { " " };
        println!(
            "{marker} {:<24} {:>3} x {:>8}  = {:>9} €   [{}]",
            line.product.label_for(locale),
            line.quantity,
            line.product.price,
            line.line_total(),
            line.product.id,
        );
    }

    println!("  {} item(s), subtotal {} €", state.item_count(), state.subtotal());
    if let Some(totals) = state.totals() {
        println!(
            "  server total {} € (tax {} €, discount {} €)",
            totals.total, totals.tax, totals.discount
        );
        if !totals.checkout.is_eligible && !totals.checkout.reason.is_empty() {
            println!("  checkout unavailable: {}", totals.checkout.reason);
        }
    }
    if state.is_loading() {
        println!("  (refreshing...)");
    }
}

pub fn notices(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::MutationFailed {
                product_id,
                message,
            } => eprintln!("! {product_id}: {message}"),
            Notice::RefreshFailed { message } => eprintln!("! cart not refreshed: {message}"),
            Notice::AddedToCart {
                product_id,
                quantity,
            } => println!("Added {quantity} x {product_id} to cart"),
        }
    }
}

pub fn routed(routed: &Routed) {
    match routed {
        Routed::LoggedIn => println!("Logged in."),
        Routed::Checkout(outcome) => checkout_outcome(outcome),
        Routed::Ignored => println!("Link ignored."),
    }
}

pub fn checkout_outcome(outcome: &CheckoutOutcome) {
    println!("{outcome}");
}

pub fn products(page: &ProductPage, locale: &str) {
    for product in &page.products {
        let stock = if product.in_stock() { "" } else { " (out of stock)" };
        let recurring = if product.subscription {
            format!(", {} €/month, {} €/year", product.price_monthly, product.price_annual)
        } else {
            String::new()
        };
        println!(
            "{:<26} {:>9} €{recurring}{stock}  [{}]",
            product.label_for(locale),
            product.price,
            product.id
        );
    }
    println!("{} of {} product(s)", page.products.len(), page.total);
}

pub fn grouped(groups: &[CategoryGroup], categories: &HashMap<CategoryId, Category>, locale: &str) {
    for group in groups {
        let title = group
            .category
            .as_ref()
            .and_then(|id| categories.get(id))
            .map_or("Other", |c| c.label.get_or_empty(locale));
        println!("== {title} ==");
        for product in &group.products {
            println!("  {:<24} {:>9} €  [{}]", product.label_for(locale), product.price, product.id);
        }
    }
}

pub fn categories(page: &CategoryPage, locale: &str) {
    for category in page.categories.iter().filter(|c| c.is_active) {
        println!("{:<24} [{}]", category.label.get_or_empty(locale), category.id);
    }
}

pub fn orders(page: &OrderPage) {
    if page.orders.is_empty() {
        println!("No orders yet.");
        return;
    }
    for order in &page.orders {
        println!(
            "{:<12} {:<12} {:>9} {}  {}",
            order.display_id(),
            order.order_status,
            order.stripe.amount_total,
            order.stripe.currency.to_uppercase(),
            order
                .created_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        );
    }
}

pub fn order(order: &Order, locale: &str) {
    println!("Order {} ({})", order.display_id(), order.order_status);
    for item in &order.products {
        println!(
            "  {:<24} {:>3} x {:>8}  {}",
            item.product.label_for(locale),
            item.quantity,
            item.price,
            item.billing_cycle
        );
    }
    println!(
        "  subtotal {}  tax {}  discount {}  total {}",
        order.stripe.amount_subtotal,
        order.stripe.amount_tax,
        order.stripe.amount_discount,
        order.stripe.amount_total
    );
    if let Some(address) = &order.billing_address {
        println!(
            "  billed to {}, {}, {} {}, {}",
            address.name, address.street, address.zip_code, address.city, address.country
        );
    }
    if let Some(invoice) = order.invoice_id() {
        println!("  invoice: {invoice}");
    }
    for change in &order.status_history {
        println!("  - {} by {}: {}", change.status, change.updated_by, change.details);
    }
}

pub fn subscriptions(page: &SubscriptionPage) {
    if page.subscriptions.is_empty() {
        println!("No subscriptions.");
        return;
    }
    for subscription in &page.subscriptions {
        println!(
            "{:<12} {:<10} {} item(s)  [{}]",
            subscription.short_id.as_deref().unwrap_or("-"),
            subscription.stripe.status,
            subscription.items.len(),
            subscription.id
        );
    }
}

pub fn subscription(subscription: &Subscription, locale: &str) {
    let state = if subscription.is_active() { "active" } else { "inactive" };
    println!(
        "Subscription {} ({state})",
        subscription.short_id.as_deref().unwrap_or("-")
    );
    for item in &subscription.items {
        println!(
            "  {:<24} x{} {}",
            item.product.label_for(locale),
            item.stripe.quantity,
            item.billing_cycle
        );
    }
    if let Some(end) = subscription.stripe.period_end {
        println!("  current period ends {}", end.format("%Y-%m-%d"));
    }
    if let Some(order) = &subscription.order {
        println!("  total {} per period", order.stripe.amount_total);
    }
}

pub fn profile(profile: &UserProfile) {
    println!("{}", profile.full_name());
    println!("  email: {}", profile.email);
    if let Some(phone) = &profile.phone {
        println!("  phone: {phone}");
    }
    if let Some(company) = &profile.company {
        println!("  company: {company}");
    }
    if let Some(address) = &profile.address {
        println!(
            "  address: {}, {} {}, {}",
            address.street, address.zip_code, address.city, address.country
        );
    }
}
