//! Command implementations.

pub mod cart;
pub mod coupon;
pub mod show;
pub mod wishlist;

use atelier_cart::{StartupError, SyncError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("startup error: {0}")]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Print a shopper-facing explanation of `error` on stderr.
#[allow(clippy::print_stderr)]
pub fn report(error: &CliError) {
    match error {
        CliError::Sync(e) => {
            eprintln!("{}", e.user_message());
            if e.is_retryable() {
                eprintln!("(this may be temporary)");
            }
        }
        CliError::Startup(_) => eprintln!("{error}"),
    }
}
