//! The session context.
//!
//! One [`CartContext`] is created when the application starts and handed by
//! reference to every consumer. It owns the store and all collaborators;
//! nothing in the engine is reachable through globals.

use std::sync::Arc;

use atelier_core::Identity;
use tracing::{info, warn};

use crate::catalog::{CachedCatalog, Catalog, StaticCatalog};
use crate::config::CartConfig;
use crate::controller::SyncController;
use crate::error::{StartupError, SyncError};
use crate::hydrate::{ReplayLimits, ReplayReport};
use crate::ledger::{FileStorage, GuestLedger, LedgerStorage};
use crate::notify::Broadcaster;
use crate::remote::{RemoteMirror, RestMirror, UnconfiguredMirror};
use crate::store::{AppState, Store};
use crate::view::{BadgeCounts, CartView};

/// Owner of one session's engine.
///
/// This struct is cheaply cloneable via `Arc`; clones share the same state.
#[derive(Clone)]
pub struct CartContext {
    inner: Arc<CartContextInner>,
}

struct CartContextInner {
    config: CartConfig,
    broadcaster: Broadcaster,
    ledger: GuestLedger,
    controller: SyncController,
}

impl std::fmt::Debug for CartContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartContext")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl CartContext {
    /// Assemble a context from explicit collaborators.
    #[must_use]
    pub fn new(
        config: CartConfig,
        storage: Arc<dyn LedgerStorage>,
        remote: Arc<dyn RemoteMirror>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        let store = Arc::new(Store::new());
        let broadcaster = Broadcaster::new();
        let ledger = GuestLedger::new(storage);
        let controller = SyncController::new(
            store,
            ledger.clone(),
            remote,
            catalog,
            broadcaster.clone(),
            ReplayLimits {
                max_quantity: config.max_replay_quantity,
            },
            config.login_policy,
        );

        Self {
            inner: Arc::new(CartContextInner {
                config,
                broadcaster,
                ledger,
                controller,
            }),
        }
    }

    /// Assemble a context from configuration: a file-backed ledger, the REST
    /// mirror if a remote is configured, and the JSON catalog if one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger directory cannot be created, the HTTP
    /// client cannot be built, or the catalog file cannot be loaded.
    pub fn from_config(config: CartConfig) -> Result<Self, StartupError> {
        let storage = FileStorage::open(&config.ledger_dir)?;

        let remote: Arc<dyn RemoteMirror> = match &config.remote {
            Some(remote) => {
                info!(url = %remote.base_url, "Using remote mirror");
                Arc::new(RestMirror::new(remote)?)
            }
            None => {
                warn!("No remote configured, signed-in mutations will fail");
                Arc::new(UnconfiguredMirror)
            }
        };

        let catalog = match &config.catalog_path {
            Some(path) => StaticCatalog::from_json_file(path)?,
            None => StaticCatalog::default(),
        };
        info!(artworks = catalog.len(), "Catalog loaded");

        Ok(Self::new(
            config,
            Arc::new(storage),
            remote,
            Arc::new(CachedCatalog::new(catalog)),
        ))
    }

    /// Run the initial load for `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if a signed-in session's remote state cannot be loaded.
    pub async fn mount(&self, identity: Identity) -> Result<ReplayReport, SyncError> {
        self.inner.controller.mount(identity).await
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &CartConfig {
        &self.inner.config
    }

    /// Get a reference to the controller.
    #[must_use]
    pub fn controller(&self) -> &SyncController {
        &self.inner.controller
    }

    /// Get a reference to the broadcaster.
    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    /// Get a reference to the guest ledger.
    #[must_use]
    pub fn ledger(&self) -> &GuestLedger {
        &self.inner.ledger
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> AppState {
        self.inner.controller.snapshot()
    }

    /// Cart display data for the current state.
    #[must_use]
    pub fn cart_view(&self) -> CartView {
        CartView::from(&self.snapshot())
    }

    /// Badge counters for the current state.
    #[must_use]
    pub fn badge_counts(&self) -> BadgeCounts {
        BadgeCounts::from(&self.snapshot())
    }
}
