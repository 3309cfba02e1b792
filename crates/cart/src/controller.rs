//! The synchronization controller.
//!
//! Every user-visible cart or wishlist action enters here. The controller
//! validates the request, picks a [`CartBackend`] from the current identity,
//! lets it apply the change, and publishes a notification.
//!
//! # Backends
//!
//! | Identity  | Backend          | Order                          | Failure          |
//! |-----------|------------------|--------------------------------|------------------|
//! | anonymous | [`LocalBackend`] | dispatch, then persist ledger  | logged, hidden   |
//! | signed in | [`RemoteBackend`]| remote call, then dispatch     | returned, no-op  |
//!
//! Signed-in writes carry absolute quantities, so concurrent or repeated
//! calls for the same artwork converge on the last value written.

use std::sync::Arc;

use async_trait::async_trait;
use atelier_core::{Artwork, ArtworkId, Coupon, Identity, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::config::LoginPolicy;
use crate::error::SyncError;
use crate::hydrate::{self, ReplayLimits, ReplayReport};
use crate::ledger::{GuestLedger, LedgerCartItem, LedgerSnapshot};
use crate::notify::{Broadcaster, Topic};
use crate::remote::RemoteMirror;
use crate::store::{Action, AppState, Store};

// =============================================================================
// Backends
// =============================================================================

/// Where a mutation is made durable.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Add one unit of `artwork`.
    async fn add(&self, artwork: &Artwork) -> Result<(), SyncError>;

    /// Drop the artwork's cart entry.
    async fn remove(&self, artwork_id: &ArtworkId) -> Result<(), SyncError>;

    /// Set an entry's quantity. The caller has already validated it.
    async fn update_quantity(&self, artwork_id: &ArtworkId, quantity: u32)
    -> Result<(), SyncError>;

    /// Empty the cart and drop the coupon.
    async fn clear(&self) -> Result<(), SyncError>;

    /// Save an artwork to the wishlist.
    async fn save(&self, artwork_id: &ArtworkId, added_at: DateTime<Utc>)
    -> Result<(), SyncError>;

    /// Remove an artwork from the wishlist.
    async fn unsave(&self, artwork_id: &ArtworkId) -> Result<(), SyncError>;

    /// Replace the applied coupon.
    async fn apply_coupon(&self, coupon: &Coupon) -> Result<(), SyncError>;

    /// Drop the applied coupon.
    async fn remove_coupon(&self) -> Result<(), SyncError>;
}

/// Guest backend: updates memory first, then mirrors into the ledger.
///
/// Never fails. Ledger write errors are logged and dropped.
#[derive(Debug)]
pub struct LocalBackend<'a> {
    store: &'a Store,
    ledger: &'a GuestLedger,
}

impl<'a> LocalBackend<'a> {
    #[must_use]
    pub const fn new(store: &'a Store, ledger: &'a GuestLedger) -> Self {
        Self { store, ledger }
    }
}

fn log_persist_failure(operation: &str, result: Result<(), crate::ledger::LedgerError>) {
    if let Err(e) = result {
        warn!(operation, error = %e, "Failed to persist guest ledger");
    }
}

#[async_trait]
impl CartBackend for LocalBackend<'_> {
    async fn add(&self, artwork: &Artwork) -> Result<(), SyncError> {
        self.store.dispatch(Action::AddToCart(artwork.clone()));
        log_persist_failure("add_to_cart", self.ledger.add_to_cart(artwork));
        Ok(())
    }

    async fn remove(&self, artwork_id: &ArtworkId) -> Result<(), SyncError> {
        self.store.dispatch(Action::RemoveFromCart(artwork_id.clone()));
        log_persist_failure("remove_from_cart", self.ledger.remove_from_cart(artwork_id));
        Ok(())
    }

    async fn update_quantity(
        &self,
        artwork_id: &ArtworkId,
        quantity: u32,
    ) -> Result<(), SyncError> {
        self.store.dispatch(Action::UpdateQuantity {
            artwork_id: artwork_id.clone(),
            quantity,
        });
        log_persist_failure(
            "update_quantity",
            self.ledger.set_quantity(artwork_id, quantity),
        );
        Ok(())
    }

    async fn clear(&self) -> Result<(), SyncError> {
        self.store.dispatch(Action::ClearCart);
        log_persist_failure("clear_cart", self.ledger.clear_cart());
        Ok(())
    }

    async fn save(&self, artwork_id: &ArtworkId, added_at: DateTime<Utc>) -> Result<(), SyncError> {
        self.store.dispatch(Action::AddToWishlist {
            artwork_id: artwork_id.clone(),
            added_at,
        });
        log_persist_failure("add_to_wishlist", self.ledger.add_to_wishlist(artwork_id));
        Ok(())
    }

    async fn unsave(&self, artwork_id: &ArtworkId) -> Result<(), SyncError> {
        self.store
            .dispatch(Action::RemoveFromWishlist(artwork_id.clone()));
        log_persist_failure(
            "remove_from_wishlist",
            self.ledger.remove_from_wishlist(artwork_id),
        );
        Ok(())
    }

    async fn apply_coupon(&self, coupon: &Coupon) -> Result<(), SyncError> {
        self.store.dispatch(Action::ApplyCoupon(coupon.clone()));
        log_persist_failure("apply_coupon", self.ledger.set_coupon(coupon));
        Ok(())
    }

    async fn remove_coupon(&self) -> Result<(), SyncError> {
        self.store.dispatch(Action::RemoveCoupon);
        log_persist_failure("remove_coupon", self.ledger.clear_coupon());
        Ok(())
    }
}

/// Signed-in backend: the remote call must succeed before memory changes.
pub struct RemoteBackend<'a> {
    store: &'a Store,
    mirror: &'a dyn RemoteMirror,
    user: UserId,
}

impl std::fmt::Debug for RemoteBackend<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl<'a> RemoteBackend<'a> {
    #[must_use]
    pub const fn new(store: &'a Store, mirror: &'a dyn RemoteMirror, user: UserId) -> Self {
        Self {
            store,
            mirror,
            user,
        }
    }
}

#[async_trait]
impl CartBackend for RemoteBackend<'_> {
    async fn add(&self, artwork: &Artwork) -> Result<(), SyncError> {
        let current = self
            .store
            .snapshot()
            .cart
            .quantity_of(&artwork.id)
            .unwrap_or(0);
        self.mirror
            .upsert_cart_item(&self.user, &artwork.id, current.saturating_add(1))
            .await?;
        self.store.dispatch(Action::AddToCart(artwork.clone()));
        Ok(())
    }

    async fn remove(&self, artwork_id: &ArtworkId) -> Result<(), SyncError> {
        self.mirror.delete_cart_item(&self.user, artwork_id).await?;
        self.store
            .dispatch(Action::RemoveFromCart(artwork_id.clone()));
        Ok(())
    }

    async fn update_quantity(
        &self,
        artwork_id: &ArtworkId,
        quantity: u32,
    ) -> Result<(), SyncError> {
        // Lines kept from a guest session have no remote row yet; a
        // conflict-replace upsert creates it instead of patching nothing.
        self.mirror
            .upsert_cart_item(&self.user, artwork_id, quantity)
            .await?;
        self.store.dispatch(Action::UpdateQuantity {
            artwork_id: artwork_id.clone(),
            quantity,
        });
        Ok(())
    }

    async fn clear(&self) -> Result<(), SyncError> {
        let artwork_ids: Vec<ArtworkId> = self.store.snapshot().cart.artwork_ids().cloned().collect();

        // Rows already deleted leave memory too, so a partial failure never
        // shows rows the remote has dropped.
        for artwork_id in artwork_ids {
            self.mirror.delete_cart_item(&self.user, &artwork_id).await?;
            self.store.dispatch(Action::RemoveFromCart(artwork_id));
        }
        self.store.dispatch(Action::ClearCart);
        Ok(())
    }

    async fn save(&self, artwork_id: &ArtworkId, added_at: DateTime<Utc>) -> Result<(), SyncError> {
        self.mirror
            .insert_wishlist_item(&self.user, artwork_id)
            .await?;
        self.store.dispatch(Action::AddToWishlist {
            artwork_id: artwork_id.clone(),
            added_at,
        });
        Ok(())
    }

    async fn unsave(&self, artwork_id: &ArtworkId) -> Result<(), SyncError> {
        self.mirror
            .delete_wishlist_item(&self.user, artwork_id)
            .await?;
        self.store
            .dispatch(Action::RemoveFromWishlist(artwork_id.clone()));
        Ok(())
    }

    // Coupons have no remote table; they live in memory for the session.
    async fn apply_coupon(&self, coupon: &Coupon) -> Result<(), SyncError> {
        self.store.dispatch(Action::ApplyCoupon(coupon.clone()));
        Ok(())
    }

    async fn remove_coupon(&self) -> Result<(), SyncError> {
        self.store.dispatch(Action::RemoveCoupon);
        Ok(())
    }
}

// =============================================================================
// SyncController
// =============================================================================

/// Routes every mutation to the right backend and announces it.
#[derive(Clone)]
pub struct SyncController {
    store: Arc<Store>,
    ledger: GuestLedger,
    remote: Arc<dyn RemoteMirror>,
    catalog: Arc<dyn Catalog>,
    broadcaster: Broadcaster,
    limits: ReplayLimits,
    login_policy: LoginPolicy,
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("limits", &self.limits)
            .field("login_policy", &self.login_policy)
            .finish_non_exhaustive()
    }
}

impl SyncController {
    /// Wire a controller to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        ledger: GuestLedger,
        remote: Arc<dyn RemoteMirror>,
        catalog: Arc<dyn Catalog>,
        broadcaster: Broadcaster,
        limits: ReplayLimits,
        login_policy: LoginPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            remote,
            catalog,
            broadcaster,
            limits,
            login_policy,
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> AppState {
        self.store.snapshot()
    }

    /// The policy applied when a guest signs in.
    #[must_use]
    pub const fn login_policy(&self) -> LoginPolicy {
        self.login_policy
    }

    /// The backend for the current identity.
    fn backend(&self) -> Box<dyn CartBackend + '_> {
        match self.store.identity() {
            Identity::Anonymous => Box::new(LocalBackend::new(&self.store, &self.ledger)),
            Identity::User(user) => {
                Box::new(RemoteBackend::new(&self.store, self.remote.as_ref(), user))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    /// Add one unit of `artwork`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteUnavailable`] if a signed-in write fails;
    /// the cart is then unchanged.
    #[instrument(skip(self, artwork), fields(artwork = %artwork.id))]
    pub async fn add_to_cart(&self, artwork: &Artwork) -> Result<(), SyncError> {
        self.backend().add(artwork).await?;
        self.broadcaster.publish(Topic::CartChanged);
        Ok(())
    }

    /// Look the artwork up in the catalog, then add one unit of it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownArtwork`] if the catalog has no such id,
    /// [`SyncError::Catalog`] if the lookup fails, or any error of
    /// [`add_to_cart`](Self::add_to_cart).
    #[instrument(skip(self), fields(artwork = %artwork_id))]
    pub async fn add_to_cart_by_id(&self, artwork_id: &ArtworkId) -> Result<Artwork, SyncError> {
        let artwork = self
            .catalog
            .artwork(artwork_id)
            .await?
            .ok_or_else(|| SyncError::UnknownArtwork(artwork_id.clone()))?;
        self.add_to_cart(&artwork).await?;
        Ok(artwork)
    }

    /// Drop the artwork's entry. Removing an absent artwork is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteUnavailable`] if a signed-in delete fails;
    /// the entry is then kept.
    #[instrument(skip(self), fields(artwork = %artwork_id))]
    pub async fn remove_from_cart(&self, artwork_id: &ArtworkId) -> Result<(), SyncError> {
        self.backend().remove(artwork_id).await?;
        self.broadcaster.publish(Topic::CartChanged);
        Ok(())
    }

    /// Set the quantity of an artwork already in the cart.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidQuantity`] for quantities below 1 (or
    /// beyond `u32`), [`SyncError::NotInCart`] if the artwork has no entry,
    /// or [`SyncError::RemoteUnavailable`] if a signed-in write fails.
    #[instrument(skip(self), fields(artwork = %artwork_id))]
    pub async fn update_quantity(
        &self,
        artwork_id: &ArtworkId,
        quantity: i64,
    ) -> Result<(), SyncError> {
        let valid = u32::try_from(quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| SyncError::InvalidQuantity {
                artwork_id: artwork_id.clone(),
                quantity,
            })?;

        if !self.store.snapshot().cart.contains(artwork_id) {
            return Err(SyncError::NotInCart(artwork_id.clone()));
        }

        self.backend().update_quantity(artwork_id, valid).await?;
        self.broadcaster.publish(Topic::CartChanged);
        Ok(())
    }

    /// Empty the cart and drop the coupon.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteUnavailable`] if a signed-in delete fails.
    /// Entries deleted remotely before the failure are removed locally too.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), SyncError> {
        let before = self.store.snapshot().cart.len();
        let result = self.backend().clear().await;

        if result.is_ok() || self.store.snapshot().cart.len() != before {
            self.broadcaster.publish(Topic::CartChanged);
        }
        result
    }

    // -------------------------------------------------------------------------
    // Wishlist
    // -------------------------------------------------------------------------

    /// Save an artwork. Saving twice keeps one entry.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteUnavailable`] if a signed-in insert fails.
    #[instrument(skip(self), fields(artwork = %artwork_id))]
    pub async fn add_to_wishlist(&self, artwork_id: &ArtworkId) -> Result<(), SyncError> {
        self.backend().save(artwork_id, Utc::now()).await?;
        self.broadcaster.publish(Topic::WishlistChanged);
        Ok(())
    }

    /// Remove a saved artwork.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteUnavailable`] if a signed-in delete fails.
    #[instrument(skip(self), fields(artwork = %artwork_id))]
    pub async fn remove_from_wishlist(&self, artwork_id: &ArtworkId) -> Result<(), SyncError> {
        self.backend().unsave(artwork_id).await?;
        self.broadcaster.publish(Topic::WishlistChanged);
        Ok(())
    }

    /// Save the artwork if it is not saved, otherwise remove it.
    /// Returns whether the artwork is saved afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteUnavailable`] if a signed-in write fails.
    pub async fn toggle_wishlist(&self, artwork_id: &ArtworkId) -> Result<bool, SyncError> {
        if self.store.snapshot().wishlist.contains(artwork_id) {
            self.remove_from_wishlist(artwork_id).await?;
            Ok(false)
        } else {
            self.add_to_wishlist(artwork_id).await?;
            Ok(true)
        }
    }

    // -------------------------------------------------------------------------
    // Coupon
    // -------------------------------------------------------------------------

    /// Validate and apply a coupon, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidCoupon`] if the code or percentage is invalid.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str, percent: Decimal) -> Result<Coupon, SyncError> {
        let coupon = Coupon::new(code, percent)?;
        self.backend().apply_coupon(&coupon).await?;
        self.broadcaster.publish(Topic::CartChanged);
        Ok(coupon)
    }

    /// Drop the applied coupon.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the other mutations.
    #[instrument(skip(self))]
    pub async fn remove_coupon(&self) -> Result<(), SyncError> {
        self.backend().remove_coupon().await?;
        self.broadcaster.publish(Topic::CartChanged);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Identity and loading
    // -------------------------------------------------------------------------

    /// Initial load for a freshly started session.
    ///
    /// Guests are hydrated from the ledger. Signed-in users get their remote
    /// cart and wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote state cannot be loaded; the session is
    /// then signed in with empty collections.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn mount(&self, identity: Identity) -> Result<ReplayReport, SyncError> {
        self.store.dispatch(Action::Reset);
        self.store.dispatch(Action::SetIdentity(identity.clone()));

        let report = match identity {
            Identity::Anonymous => {
                hydrate::hydrate(&self.store, &self.ledger, self.limits, Utc::now())
                    .unwrap_or_default()
            }
            Identity::User(user) => {
                self.store.dispatch(Action::SetLoading(true));
                let loaded = self.load_remote(&user).await;
                self.store.dispatch(Action::SetLoading(false));
                hydrate::replay(&self.store, &loaded?, self.limits, Utc::now())
            }
        };

        self.publish_all();
        Ok(report)
    }

    /// React to the identity provider's "current user" signal.
    ///
    /// # Errors
    ///
    /// Returns an error if a sign-in policy needs the remote and it fails.
    /// The identity is then left unchanged.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn set_identity(&self, identity: Identity) -> Result<(), SyncError> {
        let current = self.store.identity();
        if current == identity {
            return Ok(());
        }

        match (current, identity) {
            (Identity::Anonymous, Identity::User(user)) => self.sign_in(user).await,
            (Identity::User(_), Identity::Anonymous) => {
                self.sign_out();
                Ok(())
            }
            (Identity::User(_), Identity::User(user)) => {
                // Switching accounts never carries one account's items into another.
                let snapshot = self.load_remote(&user).await?;
                self.store.dispatch(Action::SetIdentity(Identity::User(user)));
                hydrate::replay(&self.store, &snapshot, self.limits, Utc::now());
                self.publish_all();
                Ok(())
            }
            (Identity::Anonymous, Identity::Anonymous) => Ok(()),
        }
    }

    /// The shared guest ledger was changed by someone else. Re-hydrate if
    /// this session is a guest.
    #[instrument(skip(self))]
    pub fn storage_changed(&self) -> Option<ReplayReport> {
        let report = hydrate::hydrate(&self.store, &self.ledger, self.limits, Utc::now())?;
        self.broadcaster.publish(Topic::ExternalStorageChanged);
        Some(report)
    }

    async fn sign_in(&self, user: UserId) -> Result<(), SyncError> {
        match self.login_policy {
            LoginPolicy::KeepLocal => {
                self.store.dispatch(Action::SetIdentity(Identity::User(user)));
            }
            LoginPolicy::AdoptRemote => {
                let snapshot = self.load_remote(&user).await?;
                self.store.dispatch(Action::SetIdentity(Identity::User(user)));
                hydrate::replay(&self.store, &snapshot, self.limits, Utc::now());
                self.publish_all();
            }
            LoginPolicy::MergeIntoRemote => {
                let guest = self.store.snapshot();
                self.merge_into_remote(&user, &guest).await?;

                let mut snapshot = self.load_remote(&user).await?;
                snapshot.coupon = guest.coupon;
                self.store.dispatch(Action::SetIdentity(Identity::User(user)));
                hydrate::replay(&self.store, &snapshot, self.limits, Utc::now());

                if let Err(e) = self.ledger.clear_all() {
                    warn!(error = %e, "Failed to clear guest ledger after merge");
                }
                self.publish_all();
            }
        }

        info!(policy = %self.login_policy, "Signed in");
        Ok(())
    }

    fn sign_out(&self) {
        self.store.dispatch(Action::SetIdentity(Identity::Anonymous));
        hydrate::hydrate(&self.store, &self.ledger, self.limits, Utc::now());
        self.publish_all();
        info!("Signed out");
    }

    /// Push the guest cart and wishlist into the user's remote rows.
    ///
    /// Each line leaves the guest cart and ledger as soon as its upsert
    /// succeeds, so a merge that fails part-way can be retried without
    /// counting the same units twice.
    async fn merge_into_remote(&self, user: &UserId, guest: &AppState) -> Result<(), SyncError> {
        let remote_cart = self.remote.fetch_cart(user).await?;

        let mut moved = 0_usize;
        for entry in guest.cart.entries() {
            let existing = remote_cart
                .iter()
                .find(|row| &row.artwork_id == entry.artwork_id())
                .map_or(0, |row| row.quantity);
            let upserted = self
                .remote
                .upsert_cart_item(user, entry.artwork_id(), existing.saturating_add(entry.quantity))
                .await;

            if let Err(e) = upserted {
                if moved > 0 {
                    warn!(moved, "Merge interrupted, moved lines stay on the remote");
                    self.broadcaster.publish(Topic::CartChanged);
                }
                return Err(e.into());
            }

            self.store
                .dispatch(Action::RemoveFromCart(entry.artwork_id().clone()));
            log_persist_failure(
                "merge_into_remote",
                self.ledger.remove_from_cart(entry.artwork_id()),
            );
            moved += 1;
        }

        for artwork_id in guest.wishlist.artwork_ids() {
            self.remote.insert_wishlist_item(user, artwork_id).await?;
        }
        Ok(())
    }

    /// Fetch the user's remote rows and resolve them through the catalog.
    async fn load_remote(&self, user: &UserId) -> Result<LedgerSnapshot, SyncError> {
        let rows = self.remote.fetch_cart(user).await?;
        let wishlist = self.remote.fetch_wishlist(user).await?;

        let mut cart = Vec::with_capacity(rows.len());
        for row in rows {
            match self.catalog.artwork(&row.artwork_id).await? {
                Some(artwork) => cart.push(LedgerCartItem {
                    artwork,
                    quantity: row.quantity,
                }),
                None => {
                    warn!(artwork = %row.artwork_id, "Remote cart row references unknown artwork, skipping");
                }
            }
        }

        Ok(LedgerSnapshot {
            cart,
            wishlist: wishlist.into_iter().map(|row| row.artwork_id).collect(),
            coupon: None,
        })
    }

    fn publish_all(&self) {
        self.broadcaster.publish(Topic::CartChanged);
        self.broadcaster.publish(Topic::WishlistChanged);
    }
}
