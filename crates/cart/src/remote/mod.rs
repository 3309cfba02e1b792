//! Remote mirror of signed-in users' carts and wishlists.
//!
//! # Architecture
//!
//! - The remote store is authoritative for signed-in users; the engine only
//!   mirrors mutations into it and never guesses at its state
//! - Rows are keyed by `(user, artwork)` with a unique constraint on the pair
//! - Cart writes carry an absolute quantity, so repeated or reordered calls
//!   converge on the last value written
//!
//! # Implementations
//!
//! - [`RestMirror`] - PostgREST-style HTTP API (`cart_items`, `wishlist_items`)
//! - [`MemoryMirror`] - in-process tables with an outage switch, for tests and demos
//! - [`UnconfiguredMirror`] - always fails; used when no remote URL is configured

mod memory;
mod rest;

use async_trait::async_trait;
use atelier_core::{ArtworkId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{MemoryMirror, MirrorCall};
pub use rest::RestMirror;

/// Errors that can occur when talking to the remote mirror.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request exceeded the configured timeout.
    #[error("remote request timed out")]
    Timeout,

    /// The remote answered with a non-success status.
    #[error("remote returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Rate limited by the remote.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The response body did not have the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The remote cannot be reached (outage, offline, simulated failure).
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// No remote mirror was configured for this process.
    #[error("no remote mirror configured")]
    NotConfigured,
}

impl RemoteError {
    /// Whether retrying the same call later might succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::RateLimited(_) | Self::Unavailable(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Parse(_) | Self::NotConfigured => false,
        }
    }
}

/// One cart row as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCartRow {
    pub artwork_id: ArtworkId,
    pub quantity: u32,
}

/// One wishlist row as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteWishlistRow {
    pub artwork_id: ArtworkId,
}

/// Operations the engine needs from the authoritative store.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Insert the row, or replace its quantity if `(user, artwork)` exists.
    async fn upsert_cart_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
        quantity: u32,
    ) -> Result<(), RemoteError>;

    /// Set the quantity of an existing row.
    async fn update_cart_quantity(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
        quantity: u32,
    ) -> Result<(), RemoteError>;

    /// Delete the row for `(user, artwork)`.
    async fn delete_cart_item(&self, user: &UserId, artwork_id: &ArtworkId)
    -> Result<(), RemoteError>;

    /// Insert a wishlist row; an existing row is left as is.
    async fn insert_wishlist_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError>;

    /// Delete the wishlist row for `(user, artwork)`.
    async fn delete_wishlist_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError>;

    /// All cart rows for the user, oldest first.
    async fn fetch_cart(&self, user: &UserId) -> Result<Vec<RemoteCartRow>, RemoteError>;

    /// All wishlist rows for the user.
    async fn fetch_wishlist(&self, user: &UserId) -> Result<Vec<RemoteWishlistRow>, RemoteError>;
}

/// Mirror used when the process has no remote configured.
///
/// Every call fails with [`RemoteError::NotConfigured`], so signed-in
/// mutations fail closed instead of silently going local.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredMirror;

#[async_trait]
impl RemoteMirror for UnconfiguredMirror {
    async fn upsert_cart_item(
        &self,
        _user: &UserId,
        _artwork_id: &ArtworkId,
        _quantity: u32,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn update_cart_quantity(
        &self,
        _user: &UserId,
        _artwork_id: &ArtworkId,
        _quantity: u32,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete_cart_item(
        &self,
        _user: &UserId,
        _artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn insert_wishlist_item(
        &self,
        _user: &UserId,
        _artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete_wishlist_item(
        &self,
        _user: &UserId,
        _artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn fetch_cart(&self, _user: &UserId) -> Result<Vec<RemoteCartRow>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn fetch_wishlist(&self, _user: &UserId) -> Result<Vec<RemoteWishlistRow>, RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_mirror_fails_every_call() {
        let mirror = UnconfiguredMirror;
        let user = UserId::new("u1");
        let artwork = ArtworkId::new("A1");

        assert!(matches!(
            mirror.upsert_cart_item(&user, &artwork, 1).await,
            Err(RemoteError::NotConfigured)
        ));
        assert!(matches!(
            mirror.fetch_cart(&user).await,
            Err(RemoteError::NotConfigured)
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::Timeout.is_transient());
        assert!(RemoteError::Unavailable("offline".into()).is_transient());
        assert!(
            RemoteError::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !RemoteError::Status {
                status: 409,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!RemoteError::NotConfigured.is_transient());
    }
}
