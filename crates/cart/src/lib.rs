//! Atelier cart engine.
//!
//! Keeps a shopper's cart, wishlist and coupon consistent across anonymous
//! and signed-in sessions.
//!
//! # Architecture
//!
//! - [`store`] - pure reducer and the lock-guarded current state
//! - [`ledger`] - durable guest record (cart, wishlist, coupon)
//! - [`remote`] - authoritative store for signed-in users
//! - [`controller`] - routes each mutation to the ledger or the remote
//! - [`hydrate`] - replays persisted state into memory
//! - [`notify`] - topic-based change notifications
//! - [`catalog`] - artwork lookup
//! - [`view`] - display models derived from a snapshot
//! - [`context`] - the per-session owner of all of the above
//!
//! # Example
//!
//! ```no_run
//! use atelier_cart::{CartConfig, CartContext};
//! use atelier_core::{ArtworkId, Identity};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let context = CartContext::from_config(CartConfig::from_env()?)?;
//! context.mount(Identity::Anonymous).await?;
//! context
//!     .controller()
//!     .add_to_cart_by_id(&ArtworkId::new("A1"))
//!     .await?;
//! println!("{} items", context.badge_counts().cart_count);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod hydrate;
pub mod ledger;
pub mod notify;
pub mod remote;
pub mod store;
pub mod view;

pub use catalog::{CachedCatalog, Catalog, CatalogError, StaticCatalog};
pub use config::{CartConfig, ConfigError, LoginPolicy, RemoteConfig};
pub use context::CartContext;
pub use controller::{CartBackend, LocalBackend, RemoteBackend, SyncController};
pub use error::{StartupError, SyncError};
pub use hydrate::{ReplayLimits, ReplayReport};
pub use ledger::{FileStorage, GuestLedger, LedgerError, LedgerStorage, MemoryStorage};
pub use notify::{Broadcaster, Subscription, Topic};
pub use remote::{
    MemoryMirror, MirrorCall, RemoteError, RemoteMirror, RestMirror, UnconfiguredMirror,
};
pub use store::{Action, AppState, Store};
pub use view::{BadgeCounts, CartView};
