//! Cynapp CLI - terminal front end for the storefront client.
//!
//! # Usage
//!
//! ```bash
//! # Open the hosted login page, then deliver the returned deep link
//! cynapp login
//! cynapp open 'cynapp://auth?authToken=...'
//!
//! # Work with the cart
//! cynapp cart show
//! cynapp cart add 64f0c2 --qty 2
//! cynapp cart inc 64f0c2
//! cynapp cart dec 64f0c2
//!
//! # Pay, then deliver the provider's return link
//! cynapp checkout
//! cynapp open 'cynapp://checkout?success=true&orderId=ORD-9'
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` - Session management
//! - `open` - Deliver a `cynapp://` deep link
//! - `cart` - Show and mutate the cart
//! - `checkout` - Start a hosted checkout
//! - `products` / `categories` - Browse the catalog
//! - `orders` / `order` / `invoice` / `subscriptions` / `profile` / `password` - Account

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use cynapp_storefront::Storefront;
use cynapp_storefront::config::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod browser;
mod commands;
mod error;
mod render;

use browser::SystemBrowser;
use error::CliError;

#[derive(Parser)]
#[command(name = "cynapp")]
#[command(author, version, about = "Cynapp storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the hosted login page, or store a token directly
    Login {
        /// Token from a `cynapp://auth` link (skips the browser)
        token: Option<String>,
    },
    /// Forget the token and cart
    Logout,
    /// Deliver a `cynapp://` deep link
    Open {
        /// The inbound URL
        url: String,
    },
    /// Show and mutate the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Start a hosted checkout
    Checkout,
    /// List products
    Products {
        /// Search query
        #[arg(short, long)]
        query: Option<String>,

        /// Page number (zero-based)
        #[arg(short, long, default_value_t = 0)]
        page: u32,

        /// Page size
        #[arg(short, long, default_value_t = 100)]
        limit: u32,

        /// Group the listing by category
        #[arg(long)]
        grouped: bool,
    },
    /// List categories
    Categories,
    /// List past orders
    Orders,
    /// Show one order
    Order {
        /// Order id
        id: String,
    },
    /// Print an invoice download URL
    Invoice {
        /// Invoice id
        id: String,
    },
    /// List subscriptions, or show one
    Subscriptions {
        /// Subscription id
        id: Option<String>,
    },
    /// Show the profile
    Profile,
    /// Change the password (reads current, new and confirmation from stdin)
    Password,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart (snapshot first, then server state)
    Show,
    /// Re-read the cart from the server
    Refresh,
    /// Add a product with a chosen quantity
    Add {
        /// Product id
        product_id: String,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    /// Add one unit
    Inc {
        /// Product id
        product_id: String,
    },
    /// Remove one unit
    Dec {
        /// Product id
        product_id: String,
    },
    /// Remove the line
    Remove {
        /// Product id
        product_id: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            render::failure(&e.to_string());
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Diagnostics go to stderr; stdout is reserved for command output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cynapp_storefront=info,cynapp_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match Storefront::new(config, Arc::new(SystemBrowser)) {
        Ok(storefront) => run(cli, &storefront).await,
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(e) = result {
        e.report();
        render::failure(&e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, storefront: &Storefront) -> Result<(), CliError> {
    match cli.command {
        Commands::Login { token } => commands::session::login(storefront, token).await?,
        Commands::Logout => commands::session::logout(storefront)?,
        Commands::Open { url } => commands::session::open(storefront, &url).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(storefront).await?,
            CartAction::Refresh => commands::cart::refresh(storefront).await?,
            CartAction::Add { product_id, qty } => {
                commands::cart::add(storefront, &product_id, qty).await?;
            }
            CartAction::Inc { product_id } => {
                commands::cart::step(storefront, &product_id, 1).await?;
            }
            CartAction::Dec { product_id } => {
                commands::cart::step(storefront, &product_id, -1).await?;
            }
            CartAction::Remove { product_id } => {
                commands::cart::remove(storefront, &product_id).await?;
            }
        },
        Commands::Checkout => commands::cart::checkout(storefront).await?,
        Commands::Products {
            query,
            page,
            limit,
            grouped,
        } => {
            commands::catalog::products(storefront, query.as_deref(), page, limit, grouped)
                .await?;
        }
        Commands::Categories => commands::catalog::categories(storefront).await?,
        Commands::Orders => commands::account::orders(storefront).await?,
        Commands::Order { id } => commands::account::order(storefront, &id).await?,
        Commands::Invoice { id } => commands::account::invoice(storefront, &id).await?,
        Commands::Subscriptions { id } => {
            commands::account::subscriptions(storefront, id.as_deref()).await?;
        }
        Commands::Profile => commands::account::profile(storefront).await?,
        Commands::Password => commands::account::password(storefront).await?,
    }
    Ok(())
}
