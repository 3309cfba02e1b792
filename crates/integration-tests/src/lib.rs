//! Integration tests for the Atelier cart engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p atelier-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `guest_session` - Anonymous sessions against a file-backed ledger
//! - `signed_in_session` - Remote-confirmed mutations and outages
//! - `identity_transitions` - Sign-in policies and sign-out
//!
//! Every test builds its own [`Session`]: a [`CartContext`] over a temporary
//! ledger directory, an in-memory remote mirror and a small fixed catalog.
//! Dropping the session and calling [`Session::reload`] simulates a page
//! reload against the same ledger.

use std::path::Path;
use std::sync::Arc;

use atelier_cart::{
    CartConfig, CartContext, FileStorage, LoginPolicy, MemoryMirror, StaticCatalog,
};
use atelier_core::{Artwork, ArtworkId};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Build an artwork with the given id and whole-unit price.
#[must_use]
pub fn artwork(id: &str, price: i64) -> Artwork {
    Artwork {
        id: ArtworkId::new(id),
        title: format!("Artwork {id}"),
        artist: "Test Artist".to_string(),
        price: Decimal::new(price, 0),
        image_url: Some(format!("/images/{id}.jpg")),
    }
}

/// The catalog every session uses.
#[must_use]
pub fn catalog() -> StaticCatalog {
    StaticCatalog::from_artworks([
        artwork("A1", 500),
        artwork("A2", 250),
        artwork("A3", 1200),
    ])
}

/// One running session plus the resources it shares with later sessions.
pub struct Session {
    pub context: CartContext,
    pub mirror: Arc<MemoryMirror>,
    ledger_dir: Arc<TempDir>,
    policy: LoginPolicy,
}

impl Session {
    /// Start a fresh session with an empty ledger and remote.
    ///
    /// # Panics
    ///
    /// Panics if the temporary ledger directory cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn start(policy: LoginPolicy) -> Self {
        let ledger_dir = Arc::new(tempfile::tempdir().expect("create ledger dir"));
        Self::open(ledger_dir, Arc::new(MemoryMirror::new()), policy)
    }

    /// Start a new session over the same ledger directory and remote,
    /// as a page reload would.
    ///
    /// # Panics
    ///
    /// Panics if the ledger directory has been removed.
    #[must_use]
    pub fn reload(&self) -> Self {
        Self::open(self.ledger_dir.clone(), self.mirror.clone(), self.policy)
    }

    /// The ledger directory shared by reloads.
    #[must_use]
    pub fn ledger_path(&self) -> &Path {
        self.ledger_dir.path()
    }

    #[allow(clippy::expect_used)]
    fn open(ledger_dir: Arc<TempDir>, mirror: Arc<MemoryMirror>, policy: LoginPolicy) -> Self {
        let config = CartConfig {
            ledger_dir: ledger_dir.path().to_path_buf(),
            login_policy: policy,
            ..CartConfig::default()
        };
        let storage = FileStorage::open(&config.ledger_dir).expect("open ledger");
        let context = CartContext::new(
            config,
            Arc::new(storage),
            mirror.clone(),
            Arc::new(catalog()),
        );

        Self {
            context,
            mirror,
            ledger_dir,
            policy,
        }
    }
}
