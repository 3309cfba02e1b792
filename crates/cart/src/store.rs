//! In-memory cart, wishlist and coupon state.
//!
//! [`reduce`] is the only place state changes. It is a pure function from a
//! snapshot and an [`Action`] to the next snapshot; the [`Store`] owns the
//! current snapshot and applies actions to it one at a time.
//!
//! The reducer deliberately does not validate its input. A zero quantity in
//! [`Action::UpdateQuantity`] is stored as given; callers go through the
//! [`SyncController`](crate::controller::SyncController), which rejects it.

use std::sync::{PoisonError, RwLock};

use atelier_core::{Artwork, ArtworkId, Coupon, Identity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::trace;

// =============================================================================
// Cart
// =============================================================================

/// One artwork in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartEntry {
    /// Artwork snapshot taken when the entry was created.
    pub artwork: Artwork,
    /// Number of units, normally at least 1.
    pub quantity: u32,
}

impl CartEntry {
    /// The catalog key of this entry.
    #[must_use]
    pub const fn artwork_id(&self) -> &ArtworkId {
        &self.artwork.id
    }
}

/// Cart entries in insertion order, at most one per artwork.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

impl Cart {
    /// Entries in the order they were first added.
    #[must_use]
    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    /// Look up the entry for an artwork.
    #[must_use]
    pub fn get(&self, artwork_id: &ArtworkId) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.artwork_id() == artwork_id)
    }

    /// Current quantity of an artwork, if present.
    #[must_use]
    pub fn quantity_of(&self, artwork_id: &ArtworkId) -> Option<u32> {
        self.get(artwork_id).map(|e| e.quantity)
    }

    /// Returns `true` if the artwork has an entry.
    #[must_use]
    pub fn contains(&self, artwork_id: &ArtworkId) -> bool {
        self.get(artwork_id).is_some()
    }

    /// Number of distinct artworks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cart has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all quantities (the badge count).
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.quantity)).sum()
    }

    /// Artwork keys in display order.
    pub fn artwork_ids(&self) -> impl Iterator<Item = &ArtworkId> {
        self.entries.iter().map(CartEntry::artwork_id)
    }

    fn add(&mut self, artwork: &Artwork) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.artwork.id == artwork.id) {
            entry.quantity = entry.quantity.saturating_add(1);
        } else {
            self.entries.push(CartEntry {
                artwork: artwork.clone(),
                quantity: 1,
            });
        }
    }

    fn remove(&mut self, artwork_id: &ArtworkId) {
        self.entries.retain(|e| e.artwork_id() != artwork_id);
    }

    fn set_quantity(&mut self, artwork_id: &ArtworkId, quantity: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.artwork_id() == artwork_id) {
            entry.quantity = quantity;
        }
    }
}

// =============================================================================
// Wishlist
// =============================================================================

/// One saved artwork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishlistEntry {
    /// Catalog key.
    pub artwork_id: ArtworkId,
    /// When the artwork was saved.
    pub added_at: DateTime<Utc>,
}

/// Saved artworks, at most one entry per artwork.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Wishlist {
    entries: Vec<WishlistEntry>,
}

impl Wishlist {
    /// All entries.
    #[must_use]
    pub fn entries(&self) -> &[WishlistEntry] {
        &self.entries
    }

    /// Returns `true` if the artwork is saved.
    #[must_use]
    pub fn contains(&self, artwork_id: &ArtworkId) -> bool {
        self.entries.iter().any(|e| &e.artwork_id == artwork_id)
    }

    /// Number of saved artworks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Saved artwork keys.
    pub fn artwork_ids(&self) -> impl Iterator<Item = &ArtworkId> {
        self.entries.iter().map(|e| &e.artwork_id)
    }
}

// =============================================================================
// AppState and actions
// =============================================================================

/// The aggregate snapshot every UI fragment renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppState {
    pub identity: Identity,
    pub cart: Cart,
    pub wishlist: Wishlist,
    pub coupon: Option<Coupon>,
    pub loading: bool,
}

/// A requested state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Increment the artwork's quantity, or append it with quantity 1.
    AddToCart(Artwork),
    RemoveFromCart(ArtworkId),
    /// Set the quantity of an existing entry. Not validated here.
    UpdateQuantity {
        artwork_id: ArtworkId,
        quantity: u32,
    },
    /// Empty the cart and drop the coupon.
    ClearCart,
    /// Save an artwork; a no-op if already saved.
    AddToWishlist {
        artwork_id: ArtworkId,
        added_at: DateTime<Utc>,
    },
    RemoveFromWishlist(ArtworkId),
    ApplyCoupon(Coupon),
    RemoveCoupon,
    /// Replace the identity. Cart and wishlist are left alone.
    SetIdentity(Identity),
    SetLoading(bool),
    /// Empty cart, wishlist and coupon, keeping identity.
    Reset,
}

impl Action {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddToCart(_) => "add_to_cart",
            Self::RemoveFromCart(_) => "remove_from_cart",
            Self::UpdateQuantity { .. } => "update_quantity",
            Self::ClearCart => "clear_cart",
            Self::AddToWishlist { .. } => "add_to_wishlist",
            Self::RemoveFromWishlist(_) => "remove_from_wishlist",
            Self::ApplyCoupon(_) => "apply_coupon",
            Self::RemoveCoupon => "remove_coupon",
            Self::SetIdentity(_) => "set_identity",
            Self::SetLoading(_) => "set_loading",
            Self::Reset => "reset",
        }
    }
}

/// Compute the next state. Pure and total.
#[must_use]
pub fn reduce(mut state: AppState, action: &Action) -> AppState {
    match action {
        Action::AddToCart(artwork) => state.cart.add(artwork),
        Action::RemoveFromCart(artwork_id) => state.cart.remove(artwork_id),
        Action::UpdateQuantity {
            artwork_id,
            quantity,
        } => state.cart.set_quantity(artwork_id, *quantity),
        Action::ClearCart => {
            state.cart = Cart::default();
            state.coupon = None;
        }
        Action::AddToWishlist {
            artwork_id,
            added_at,
        } => {
            if !state.wishlist.contains(artwork_id) {
                state.wishlist.entries.push(WishlistEntry {
                    artwork_id: artwork_id.clone(),
                    added_at: *added_at,
                });
            }
        }
        Action::RemoveFromWishlist(artwork_id) => {
            state.wishlist.entries.retain(|e| &e.artwork_id != artwork_id);
        }
        Action::ApplyCoupon(coupon) => state.coupon = Some(coupon.clone()),
        Action::RemoveCoupon => state.coupon = None,
        Action::SetIdentity(identity) => state.identity = identity.clone(),
        Action::SetLoading(loading) => state.loading = *loading,
        Action::Reset => {
            state.cart = Cart::default();
            state.wishlist = Wishlist::default();
            state.coupon = None;
        }
    }
    state
}

// =============================================================================
// Store
// =============================================================================

/// Owner of the current [`AppState`].
///
/// The lock is only held for the duration of a single reduction or clone,
/// never across an await point.
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<AppState>,
}

impl Store {
    /// Create a store holding the empty initial state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone the current state.
    #[must_use]
    pub fn snapshot(&self) -> AppState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current identity without cloning the whole state.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .identity
            .clone()
    }

    /// Apply an action to the current state.
    pub fn dispatch(&self, action: Action) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let current = std::mem::take(&mut *guard);
        *guard = reduce(current, &action);
        trace!(action = action.name(), "dispatched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn artwork(id: &str) -> Artwork {
        Artwork {
            id: ArtworkId::new(id),
            title: format!("Artwork {id}"),
            artist: "Test Artist".to_string(),
            price: Decimal::new(500, 0),
            image_url: None,
        }
    }

    fn added_at() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn apply(actions: &[Action]) -> AppState {
        actions
            .iter()
            .fold(AppState::default(), |state, action| reduce(state, action))
    }

    #[test]
    fn test_add_same_artwork_twice_increments() {
        let state = apply(&[
            Action::AddToCart(artwork("A1")),
            Action::AddToCart(artwork("A1")),
        ]);
        assert_eq!(state.cart.len(), 1);
        assert_eq!(state.cart.quantity_of(&ArtworkId::new("A1")), Some(2));
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let state = apply(&[
            Action::AddToCart(artwork("B")),
            Action::AddToCart(artwork("A")),
            Action::AddToCart(artwork("B")),
        ]);
        let ids: Vec<_> = state.cart.artwork_ids().map(ArtworkId::as_str).collect();
        assert_eq!(ids, ["B", "A"]);
        assert_eq!(state.cart.item_count(), 3);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let before = apply(&[Action::AddToCart(artwork("A1"))]);
        let after = reduce(
            before.clone(),
            &Action::RemoveFromCart(ArtworkId::new("nope")),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_remove_existing() {
        let state = apply(&[
            Action::AddToCart(artwork("A1")),
            Action::AddToCart(artwork("A2")),
            Action::RemoveFromCart(ArtworkId::new("A1")),
        ]);
        assert!(!state.cart.contains(&ArtworkId::new("A1")));
        assert!(state.cart.contains(&ArtworkId::new("A2")));
    }

    #[test]
    fn test_update_quantity_passes_through_unvalidated() {
        let state = apply(&[
            Action::AddToCart(artwork("A1")),
            Action::UpdateQuantity {
                artwork_id: ArtworkId::new("A1"),
                quantity: 0,
            },
        ]);
        assert_eq!(state.cart.quantity_of(&ArtworkId::new("A1")), Some(0));
    }

    #[test]
    fn test_update_quantity_missing_is_noop() {
        let state = apply(&[Action::UpdateQuantity {
            artwork_id: ArtworkId::new("A1"),
            quantity: 4,
        }]);
        assert!(state.cart.is_empty());
    }

    #[test]
    fn test_clear_cart_clears_coupon() {
        let coupon = Coupon::new("SPRING", Decimal::new(10, 0)).ok();
        let mut actions = vec![Action::AddToCart(artwork("A1"))];
        actions.extend(coupon.map(Action::ApplyCoupon));
        actions.push(Action::ClearCart);

        let state = apply(&actions);
        assert!(state.cart.is_empty());
        assert!(state.coupon.is_none());
    }

    #[test]
    fn test_clear_cart_without_coupon() {
        let state = apply(&[Action::ClearCart]);
        assert!(state.cart.is_empty());
        assert!(state.coupon.is_none());
    }

    #[test]
    fn test_add_to_wishlist_idempotent() {
        let add = Action::AddToWishlist {
            artwork_id: ArtworkId::new("A1"),
            added_at: added_at(),
        };
        let state = apply(&[add.clone(), add]);
        assert_eq!(state.wishlist.len(), 1);
    }

    #[test]
    fn test_remove_from_wishlist() {
        let state = apply(&[
            Action::AddToWishlist {
                artwork_id: ArtworkId::new("A1"),
                added_at: added_at(),
            },
            Action::RemoveFromWishlist(ArtworkId::new("A1")),
            Action::RemoveFromWishlist(ArtworkId::new("A1")),
        ]);
        assert!(state.wishlist.is_empty());
    }

    #[test]
    fn test_set_identity_keeps_collections() {
        let state = apply(&[
            Action::AddToCart(artwork("A1")),
            Action::SetIdentity(Identity::User(atelier_core::UserId::new("u1"))),
        ]);
        assert_eq!(state.cart.len(), 1);
        assert!(!state.identity.is_anonymous());
    }

    #[test]
    fn test_reset_keeps_identity() {
        let user = Identity::User(atelier_core::UserId::new("u1"));
        let state = apply(&[
            Action::SetIdentity(user.clone()),
            Action::AddToCart(artwork("A1")),
            Action::AddToWishlist {
                artwork_id: ArtworkId::new("A2"),
                added_at: added_at(),
            },
            Action::Reset,
        ]);
        assert!(state.cart.is_empty());
        assert!(state.wishlist.is_empty());
        assert_eq!(state.identity, user);
    }

    #[test]
    fn test_store_dispatch_and_snapshot() {
        let store = Store::new();
        store.dispatch(Action::AddToCart(artwork("A1")));
        store.dispatch(Action::SetLoading(true));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.cart.item_count(), 1);
        assert!(snapshot.loading);
        assert!(store.identity().is_anonymous());
    }
}
