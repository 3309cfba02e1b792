//! Errors returned by cart and wishlist operations.

use atelier_core::{ArtworkId, CouponError};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::ledger::LedgerError;
use crate::remote::RemoteError;

/// Message shown to shoppers when a signed-in mutation fails.
const RETRYABLE_MESSAGE: &str = "We couldn't update your cart. Please try again.";

/// Why a cart or wishlist operation did not take effect.
///
/// Guest operations only fail validation; storage problems on the guest path
/// are logged and never reported.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote store rejected or never answered the call. Nothing changed locally.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(#[from] RemoteError),

    /// Quantities must be at least 1.
    #[error("invalid quantity {quantity} for artwork {artwork_id}")]
    InvalidQuantity { artwork_id: ArtworkId, quantity: i64 },

    /// The artwork has no cart entry to update.
    #[error("artwork {0} is not in the cart")]
    NotInCart(ArtworkId),

    /// The coupon failed validation.
    #[error("invalid coupon: {0}")]
    InvalidCoupon(#[from] CouponError),

    /// The catalog has no artwork with this id.
    #[error("unknown artwork {0}")]
    UnknownArtwork(ArtworkId),

    /// The catalog lookup itself failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl SyncError {
    /// Whether repeating the same operation later might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteUnavailable(e) => e.is_transient(),
            Self::Catalog(CatalogError::Unavailable(_)) => true,
            _ => false,
        }
    }

    /// Text suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RemoteUnavailable(_) | Self::Catalog(_) => RETRYABLE_MESSAGE.to_string(),
            Self::InvalidQuantity { .. } => "Quantity must be at least 1.".to_string(),
            Self::NotInCart(_) => "That artwork is no longer in your cart.".to_string(),
            Self::InvalidCoupon(e) => format!("That coupon can't be applied: {e}."),
            Self::UnknownArtwork(_) => "That artwork is no longer available.".to_string(),
        }
    }
}

/// Failures while assembling a [`CartContext`](crate::context::CartContext)
/// from configuration.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot open guest ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("cannot build remote mirror: {0}")]
    Remote(#[from] RemoteError),
    #[error("cannot load catalog: {0}")]
    Catalog(#[from] CatalogError),
}
