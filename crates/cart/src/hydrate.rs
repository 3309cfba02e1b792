//! Rebuilding in-memory state from a persisted snapshot.
//!
//! Quantities are reconstructed by dispatching one `AddToCart` per unit, so
//! hydrated state goes through the same reducer path as live clicks. The unit
//! count per line is bounded by [`ReplayLimits`]; a line above the bound gets
//! its exact persisted quantity through one `UpdateQuantity` after the
//! bounded increments, so memory always matches the source it was loaded from.

use atelier_core::ArtworkId;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_MAX_REPLAY_QUANTITY;
use crate::ledger::{GuestLedger, LedgerSnapshot};
use crate::store::{Action, Store};

/// Bounds applied while replaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayLimits {
    /// Most `AddToCart` dispatches issued for a single line.
    pub max_quantity: u32,
}

impl Default for ReplayLimits {
    fn default() -> Self {
        Self {
            max_quantity: DEFAULT_MAX_REPLAY_QUANTITY,
        }
    }
}

/// What a replay did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Cart lines replayed.
    pub entries: usize,
    /// `AddToCart` dispatches issued.
    pub units: u64,
    /// Lines whose quantity exceeded the limit and was set directly.
    pub clamped: Vec<ArtworkId>,
    /// Wishlist ids replayed.
    pub wishlist: usize,
    /// Lines skipped because their quantity was zero.
    pub skipped: usize,
}

/// Replace the store's collections with `snapshot`.
///
/// Identity is left alone. `loading` is set for the duration of the replay.
pub fn replay(
    store: &Store,
    snapshot: &LedgerSnapshot,
    limits: ReplayLimits,
    now: DateTime<Utc>,
) -> ReplayReport {
    let mut report = ReplayReport::default();

    store.dispatch(Action::Reset);
    store.dispatch(Action::SetLoading(true));

    for item in &snapshot.cart {
        if item.quantity == 0 {
            warn!(artwork = %item.artwork.id, "Skipping ledger line with zero quantity");
            report.skipped += 1;
            continue;
        }

        let clamped = item.quantity > limits.max_quantity;
        let units = if clamped {
            warn!(
                artwork = %item.artwork.id,
                quantity = item.quantity,
                max = limits.max_quantity,
                "Replayed quantity above limit, setting it directly"
            );
            report.clamped.push(item.artwork.id.clone());
            limits.max_quantity
        } else {
            item.quantity
        };

        for _ in 0..units {
            store.dispatch(Action::AddToCart(item.artwork.clone()));
        }
        if clamped {
            store.dispatch(Action::UpdateQuantity {
                artwork_id: item.artwork.id.clone(),
                quantity: item.quantity,
            });
        }
        report.entries += 1;
        report.units += u64::from(units);
    }

    for artwork_id in &snapshot.wishlist {
        store.dispatch(Action::AddToWishlist {
            artwork_id: artwork_id.clone(),
            added_at: now,
        });
        report.wishlist += 1;
    }

    if let Some(coupon) = &snapshot.coupon {
        store.dispatch(Action::ApplyCoupon(coupon.clone()));
    }

    store.dispatch(Action::SetLoading(false));
    report
}

/// Replay the guest ledger into the store.
///
/// Only runs for anonymous sessions; returns `None` when a user is signed in.
pub fn hydrate(
    store: &Store,
    ledger: &GuestLedger,
    limits: ReplayLimits,
    now: DateTime<Utc>,
) -> Option<ReplayReport> {
    if !store.identity().is_anonymous() {
        debug!("Signed in, skipping guest hydration");
        return None;
    }

    let snapshot = ledger.snapshot();
    let report = replay(store, &snapshot, limits, now);
    info!(
        entries = report.entries,
        units = report.units,
        wishlist = report.wishlist,
        "Hydrated guest state"
    );
    Some(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use atelier_core::{Artwork, Coupon, Identity, UserId};
    use rust_decimal::Decimal;

    use crate::ledger::{LedgerCartItem, LedgerStorage, MemoryStorage, GUEST_CART_KEY};

    fn artwork(id: &str) -> Artwork {
        Artwork {
            id: ArtworkId::new(id),
            title: format!("Artwork {id}"),
            artist: "Test Artist".to_string(),
            price: Decimal::new(500, 0),
            image_url: None,
        }
    }

    fn item(id: &str, quantity: u32) -> LedgerCartItem {
        LedgerCartItem {
            artwork: artwork(id),
            quantity,
        }
    }

    #[test]
    fn test_replay_reproduces_quantities_in_order() {
        let store = Store::new();
        let snapshot = LedgerSnapshot {
            cart: vec![item("A", 3), item("B", 1)],
            ..LedgerSnapshot::default()
        };

        let report = replay(&store, &snapshot, ReplayLimits::default(), Utc::now());

        let state = store.snapshot();
        let entries = state.cart.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].artwork.id.as_str(), "A");
        assert_eq!(entries[0].quantity, 3);
        assert_eq!(entries[1].artwork.id.as_str(), "B");
        assert_eq!(entries[1].quantity, 1);
        assert_eq!(report.units, 4);
        assert!(!state.loading);
    }

    #[test]
    fn test_replay_bounds_increments_but_keeps_quantity() {
        let store = Store::new();
        let snapshot = LedgerSnapshot {
            cart: vec![item("A", 10_000), item("B", 2)],
            ..LedgerSnapshot::default()
        };

        let report = replay(&store, &snapshot, ReplayLimits { max_quantity: 5 }, Utc::now());

        let state = store.snapshot();
        assert_eq!(state.cart.quantity_of(&ArtworkId::new("A")), Some(10_000));
        assert_eq!(state.cart.quantity_of(&ArtworkId::new("B")), Some(2));
        assert_eq!(state.cart.entries()[0].artwork.id.as_str(), "A");
        assert_eq!(report.clamped, vec![ArtworkId::new("A")]);
        assert_eq!(report.units, 7);
    }

    #[test]
    fn test_replay_skips_zero_quantity() {
        let store = Store::new();
        let snapshot = LedgerSnapshot {
            cart: vec![item("A", 0), item("B", 2)],
            ..LedgerSnapshot::default()
        };

        let report = replay(&store, &snapshot, ReplayLimits::default(), Utc::now());

        assert_eq!(report.skipped, 1);
        assert_eq!(report.entries, 1);
        assert!(!store.snapshot().cart.contains(&ArtworkId::new("A")));
    }

    #[test]
    fn test_replay_restores_wishlist_and_coupon() {
        let store = Store::new();
        let now = Utc::now();
        let coupon = Coupon::new("spring", Decimal::new(10, 0)).unwrap();
        let snapshot = LedgerSnapshot {
            cart: Vec::new(),
            wishlist: vec![ArtworkId::new("W1"), ArtworkId::new("W2")],
            coupon: Some(coupon.clone()),
        };

        let report = replay(&store, &snapshot, ReplayLimits::default(), now);

        let state = store.snapshot();
        assert_eq!(report.wishlist, 2);
        assert_eq!(state.wishlist.len(), 2);
        assert!(state.wishlist.entries().iter().all(|e| e.added_at == now));
        assert_eq!(state.coupon, Some(coupon));
    }

    #[test]
    fn test_hydrate_is_idempotent() {
        let store = Store::new();
        let ledger = GuestLedger::new(Arc::new(MemoryStorage::new()));
        ledger.add_to_cart(&artwork("A")).unwrap();
        ledger.add_to_cart(&artwork("A")).unwrap();

        hydrate(&store, &ledger, ReplayLimits::default(), Utc::now()).unwrap();
        hydrate(&store, &ledger, ReplayLimits::default(), Utc::now()).unwrap();

        assert_eq!(store.snapshot().cart.quantity_of(&ArtworkId::new("A")), Some(2));
    }

    #[test]
    fn test_hydrate_skipped_when_signed_in() {
        let store = Store::new();
        store.dispatch(Action::SetIdentity(Identity::User(UserId::new("u1"))));
        let ledger = GuestLedger::new(Arc::new(MemoryStorage::new()));
        ledger.add_to_cart(&artwork("A")).unwrap();

        assert!(hydrate(&store, &ledger, ReplayLimits::default(), Utc::now()).is_none());
        assert!(store.snapshot().cart.is_empty());
    }

    #[test]
    fn test_hydrate_from_malformed_ledger_is_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(GUEST_CART_KEY, "not json").unwrap();
        let ledger = GuestLedger::new(storage);
        let store = Store::new();

        let report = hydrate(&store, &ledger, ReplayLimits::default(), Utc::now()).unwrap();
        assert_eq!(report, ReplayReport::default());
        assert!(store.snapshot().cart.is_empty());
    }
}
