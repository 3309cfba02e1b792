//! Persisted guest ledger.
//!
//! The ledger is the durable record of an anonymous visitor's cart, wishlist
//! and applied coupon. It outlives the in-memory [`AppState`](crate::store::AppState)
//! and is replayed into it on the next load.
//!
//! # Layout
//!
//! | Key              | Value                                              |
//! |------------------|----------------------------------------------------|
//! | `guest_cart`     | `[{ "artwork": <Artwork>, "quantity": <int> }, …]` |
//! | `guest_wishlist` | `["<artwork id>", …]`                              |
//! | `appliedCoupon`  | `{ "code": "<code>", "discount": <number> }`       |
//!
//! Reads never fail: a missing key is empty, and data that does not parse is
//! logged and treated as empty (or, inside the cart list, skipped entry by
//! entry). Writes are read-modify-write cycles serialized by an internal lock.

mod storage;

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use atelier_core::{Artwork, ArtworkId, Coupon};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use storage::{FileStorage, LedgerStorage, MemoryStorage};

/// Storage key of the guest cart.
pub const GUEST_CART_KEY: &str = "guest_cart";
/// Storage key of the guest wishlist.
pub const GUEST_WISHLIST_KEY: &str = "guest_wishlist";
/// Storage key of the applied coupon.
pub const APPLIED_COUPON_KEY: &str = "appliedCoupon";

/// Errors raised while writing the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The storage backend failed.
    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value could not be serialized.
    #[error("ledger serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One persisted cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCartItem {
    pub artwork: Artwork,
    pub quantity: u32,
}

/// Everything the ledger holds, read in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub cart: Vec<LedgerCartItem>,
    pub wishlist: Vec<ArtworkId>,
    pub coupon: Option<Coupon>,
}

impl LedgerSnapshot {
    /// Returns `true` if the ledger holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cart.is_empty() && self.wishlist.is_empty() && self.coupon.is_none()
    }
}

/// Typed access to the guest ledger.
#[derive(Clone)]
pub struct GuestLedger {
    storage: Arc<dyn LedgerStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for GuestLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestLedger").finish_non_exhaustive()
    }
}

impl GuestLedger {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn LedgerStorage>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Persisted cart lines in display order. Malformed lines are skipped.
    #[must_use]
    pub fn cart(&self) -> Vec<LedgerCartItem> {
        let raw: Vec<serde_json::Value> = self.read_json(GUEST_CART_KEY).unwrap_or_default();
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(key = GUEST_CART_KEY, error = %e, "Skipping malformed ledger cart entry");
                    None
                }
            })
            .collect()
    }

    /// Persisted wishlist ids.
    #[must_use]
    pub fn wishlist(&self) -> Vec<ArtworkId> {
        self.read_json(GUEST_WISHLIST_KEY).unwrap_or_default()
    }

    /// Persisted coupon, if any.
    #[must_use]
    pub fn coupon(&self) -> Option<Coupon> {
        self.read_json(APPLIED_COUPON_KEY)
    }

    /// Read all three keys.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            cart: self.cart(),
            wishlist: self.wishlist(),
            coupon: self.coupon(),
        }
    }

    // -------------------------------------------------------------------------
    // Cart writes
    // -------------------------------------------------------------------------

    /// Increment the artwork's persisted quantity, or append it with quantity 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn add_to_cart(&self, artwork: &Artwork) -> Result<(), LedgerError> {
        let _guard = self.lock();
        let mut cart = self.cart();
        if let Some(item) = cart.iter_mut().find(|i| i.artwork.id == artwork.id) {
            item.quantity = item.quantity.saturating_add(1);
        } else {
            cart.push(LedgerCartItem {
                artwork: artwork.clone(),
                quantity: 1,
            });
        }
        self.write_json(GUEST_CART_KEY, &cart)
    }

    /// Drop the artwork's line.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn remove_from_cart(&self, artwork_id: &ArtworkId) -> Result<(), LedgerError> {
        let _guard = self.lock();
        let mut cart = self.cart();
        cart.retain(|i| &i.artwork.id != artwork_id);
        self.write_json(GUEST_CART_KEY, &cart)
    }

    /// Overwrite the artwork's quantity. Missing lines are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn set_quantity(&self, artwork_id: &ArtworkId, quantity: u32) -> Result<(), LedgerError> {
        let _guard = self.lock();
        let mut cart = self.cart();
        if let Some(item) = cart.iter_mut().find(|i| &i.artwork.id == artwork_id) {
            item.quantity = quantity;
        }
        self.write_json(GUEST_CART_KEY, &cart)
    }

    /// Remove the cart and the coupon tied to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn clear_cart(&self) -> Result<(), LedgerError> {
        let _guard = self.lock();
        self.storage.remove(GUEST_CART_KEY)?;
        self.storage.remove(APPLIED_COUPON_KEY)
    }

    // -------------------------------------------------------------------------
    // Wishlist writes
    // -------------------------------------------------------------------------

    /// Save an artwork id unless already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn add_to_wishlist(&self, artwork_id: &ArtworkId) -> Result<(), LedgerError> {
        let _guard = self.lock();
        let mut wishlist = self.wishlist();
        if wishlist.contains(artwork_id) {
            return Ok(());
        }
        wishlist.push(artwork_id.clone());
        self.write_json(GUEST_WISHLIST_KEY, &wishlist)
    }

    /// Drop a saved artwork id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn remove_from_wishlist(&self, artwork_id: &ArtworkId) -> Result<(), LedgerError> {
        let _guard = self.lock();
        let mut wishlist = self.wishlist();
        wishlist.retain(|id| id != artwork_id);
        self.write_json(GUEST_WISHLIST_KEY, &wishlist)
    }

    // -------------------------------------------------------------------------
    // Coupon writes
    // -------------------------------------------------------------------------

    /// Persist the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn set_coupon(&self, coupon: &Coupon) -> Result<(), LedgerError> {
        let _guard = self.lock();
        self.write_json(APPLIED_COUPON_KEY, coupon)
    }

    /// Forget the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn clear_coupon(&self) -> Result<(), LedgerError> {
        let _guard = self.lock();
        self.storage.remove(APPLIED_COUPON_KEY)
    }

    /// Remove every guest key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn clear_all(&self) -> Result<(), LedgerError> {
        let _guard = self.lock();
        self.storage.remove(GUEST_CART_KEY)?;
        self.storage.remove(GUEST_WISHLIST_KEY)?;
        self.storage.remove(APPLIED_COUPON_KEY)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read and parse a key, treating every failure as absent.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.storage.read(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Failed to read ledger key, treating as empty");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Malformed ledger data, treating as empty");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), LedgerError> {
        let json = serde_json::to_string(value)?;
        self.storage.write(key, &json)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn artwork(id: &str) -> Artwork {
        Artwork {
            id: ArtworkId::new(id),
            title: format!("Artwork {id}"),
            artist: "Test Artist".to_string(),
            price: Decimal::new(250, 0),
            image_url: None,
        }
    }

    fn ledger() -> (Arc<MemoryStorage>, GuestLedger) {
        let storage = Arc::new(MemoryStorage::new());
        let ledger = GuestLedger::new(storage.clone());
        (storage, ledger)
    }

    #[test]
    fn test_empty_ledger_reads_empty() {
        let (_, ledger) = ledger();
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn test_add_to_cart_increments_existing_line() {
        let (_, ledger) = ledger();
        ledger.add_to_cart(&artwork("A1")).unwrap();
        ledger.add_to_cart(&artwork("A2")).unwrap();
        ledger.add_to_cart(&artwork("A1")).unwrap();

        let cart = ledger.cart();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart[0].artwork.id.as_str(), "A1");
        assert_eq!(cart[0].quantity, 2);
        assert_eq!(cart[1].quantity, 1);
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let (_, ledger) = ledger();
        ledger.add_to_cart(&artwork("A1")).unwrap();
        ledger.set_quantity(&ArtworkId::new("A1"), 5).unwrap();
        assert_eq!(ledger.cart()[0].quantity, 5);

        ledger.remove_from_cart(&ArtworkId::new("A1")).unwrap();
        assert!(ledger.cart().is_empty());
    }

    #[test]
    fn test_clear_cart_drops_coupon_but_keeps_wishlist() {
        let (_, ledger) = ledger();
        ledger.add_to_cart(&artwork("A1")).unwrap();
        ledger.add_to_wishlist(&ArtworkId::new("W1")).unwrap();
        ledger
            .set_coupon(&Coupon::new("SPRING", Decimal::new(10, 0)).unwrap())
            .unwrap();

        ledger.clear_cart().unwrap();

        let snapshot = ledger.snapshot();
        assert!(snapshot.cart.is_empty());
        assert!(snapshot.coupon.is_none());
        assert_eq!(snapshot.wishlist, vec![ArtworkId::new("W1")]);
    }

    #[test]
    fn test_wishlist_is_deduplicated() {
        let (_, ledger) = ledger();
        ledger.add_to_wishlist(&ArtworkId::new("W1")).unwrap();
        ledger.add_to_wishlist(&ArtworkId::new("W1")).unwrap();
        assert_eq!(ledger.wishlist().len(), 1);

        ledger.remove_from_wishlist(&ArtworkId::new("W1")).unwrap();
        assert!(ledger.wishlist().is_empty());
    }

    #[test]
    fn test_layout_matches_storage_keys() {
        let (storage, ledger) = ledger();
        ledger.add_to_cart(&artwork("A1")).unwrap();
        ledger.add_to_wishlist(&ArtworkId::new("W1")).unwrap();

        let cart: serde_json::Value =
            serde_json::from_str(&storage.read(GUEST_CART_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(cart[0]["artwork"]["id"], "A1");
        assert_eq!(cart[0]["quantity"], 1);

        let wishlist = storage.read(GUEST_WISHLIST_KEY).unwrap().unwrap();
        assert_eq!(wishlist, r#"["W1"]"#);
    }

    #[test]
    fn test_malformed_key_reads_as_empty() {
        let (storage, ledger) = ledger();
        storage.write(GUEST_CART_KEY, "{not json").unwrap();
        storage.write(GUEST_WISHLIST_KEY, "42").unwrap();
        storage.write(APPLIED_COUPON_KEY, "\"nope\"").unwrap();

        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn test_malformed_cart_entries_are_skipped() {
        let (storage, ledger) = ledger();
        storage
            .write(
                GUEST_CART_KEY,
                r#"[
                    {"artwork":{"id":"A1","title":"T","artist":"X","price":10},"quantity":2},
                    {"artwork":{"id":"A2"},"quantity":1},
                    {"artwork":{"id":"A3","title":"T","artist":"X","price":10},"quantity":-4}
                ]"#,
            )
            .unwrap();

        let cart = ledger.cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].artwork.id.as_str(), "A1");
    }

    #[test]
    fn test_rewrite_after_malformed_data_recovers() {
        let (storage, ledger) = ledger();
        storage.write(GUEST_CART_KEY, "garbage").unwrap();

        ledger.add_to_cart(&artwork("A1")).unwrap();
        assert_eq!(ledger.cart().len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let (_, ledger) = ledger();
        ledger.add_to_cart(&artwork("A1")).unwrap();
        ledger.add_to_wishlist(&ArtworkId::new("W1")).unwrap();
        ledger.clear_all().unwrap();
        assert!(ledger.snapshot().is_empty());
    }
}
