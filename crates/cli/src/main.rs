//! Atelier CLI - drive the cart engine from a terminal.
//!
//! Each invocation is one "page load": the session is mounted (guest ledger
//! hydration, or a remote load with `--user`), one command runs, and the
//! resulting cart is printed.
//!
//! # Usage
//!
//! ```bash
//! # Guest session backed by ./.atelier/ledger
//! atelier cart add A1
//! atelier cart set A1 3
//! atelier wishlist toggle A2
//! atelier coupon apply SPRING 10
//! atelier show
//!
//! # Signed-in session (needs ATELIER_REMOTE_URL and ATELIER_REMOTE_API_KEY)
//! atelier --user 8d0f... cart remove A1
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart, wishlist and badge counts
//! - `cart add|remove|set|clear` - Cart mutations
//! - `wishlist add|remove|toggle` - Wishlist mutations
//! - `coupon apply|remove` - Coupon mutations

#![cfg_attr(not(test), forbid(unsafe_code))]

use atelier_cart::{CartConfig, CartContext};
use atelier_core::{ArtworkId, Identity, UserId};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(author, version, about = "Atelier cart and wishlist")]
struct Cli {
    /// Act as this signed-in user instead of a guest
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart, wishlist and badge counts
    Show,
    /// Change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Change the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Apply or remove a coupon
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add one unit of an artwork
    Add { artwork_id: String },
    /// Remove an artwork's line
    Remove { artwork_id: String },
    /// Set the quantity of an artwork already in the cart
    Set {
        artwork_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Save an artwork
    Add { artwork_id: String },
    /// Remove a saved artwork
    Remove { artwork_id: String },
    /// Save or unsave an artwork
    Toggle { artwork_id: String },
}

#[derive(Subcommand)]
enum CouponAction {
    /// Apply a percentage coupon
    Apply { code: String, percent: Decimal },
    /// Remove the applied coupon
    Remove,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atelier_cart=info,atelier_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        commands::report(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: CartConfig) -> Result<(), CliError> {
    let context = CartContext::from_config(config)?;
    let identity = Identity::from_optional(cli.user.map(UserId::new));
    context.mount(identity).await?;

    match cli.command {
        Commands::Show => {}
        Commands::Cart { action } => match action {
            CartAction::Add { artwork_id } => {
                commands::cart::add(&context, &ArtworkId::new(artwork_id)).await?;
            }
            CartAction::Remove { artwork_id } => {
                commands::cart::remove(&context, &ArtworkId::new(artwork_id)).await?;
            }
            CartAction::Set {
                artwork_id,
                quantity,
            } => {
                commands::cart::set(&context, &ArtworkId::new(artwork_id), quantity).await?;
            }
            CartAction::Clear => commands::cart::clear(&context).await?,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::Add { artwork_id } => {
                commands::wishlist::add(&context, &ArtworkId::new(artwork_id)).await?;
            }
            WishlistAction::Remove { artwork_id } => {
                commands::wishlist::remove(&context, &ArtworkId::new(artwork_id)).await?;
            }
            WishlistAction::Toggle { artwork_id } => {
                commands::wishlist::toggle(&context, &ArtworkId::new(artwork_id)).await?;
            }
        },
        Commands::Coupon { action } => match action {
            CouponAction::Apply { code, percent } => {
                commands::coupon::apply(&context, &code, percent).await?;
            }
            CouponAction::Remove => commands::coupon::remove(&context).await?,
        },
    }

    commands::show::print(&context);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_with_negative_quantity() {
        let cli = Cli::try_parse_from(["atelier", "--user", "u1", "cart", "set", "A1", "-2"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("u1"));
        assert!(matches!(
            cli.command,
            Commands::Cart {
                action: CartAction::Set { quantity: -2, .. }
            }
        ));
    }

    #[test]
    fn test_parse_coupon_percent() {
        let cli = Cli::try_parse_from(["atelier", "coupon", "apply", "SPRING", "12.5"]).unwrap();
        match cli.command {
            Commands::Coupon {
                action: CouponAction::Apply { code, percent },
            } => {
                assert_eq!(code, "SPRING");
                assert_eq!(percent, Decimal::new(125, 1));
            }
            _ => panic!("expected coupon apply"),
        }
    }
}
