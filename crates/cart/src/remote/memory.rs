//! In-process remote mirror.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use atelier_core::{ArtworkId, UserId};

use super::{RemoteCartRow, RemoteError, RemoteMirror, RemoteWishlistRow};

/// A call received by a [`MemoryMirror`], recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorCall {
    UpsertCartItem {
        user: UserId,
        artwork_id: ArtworkId,
        quantity: u32,
    },
    UpdateCartQuantity {
        user: UserId,
        artwork_id: ArtworkId,
        quantity: u32,
    },
    DeleteCartItem {
        user: UserId,
        artwork_id: ArtworkId,
    },
    InsertWishlistItem {
        user: UserId,
        artwork_id: ArtworkId,
    },
    DeleteWishlistItem {
        user: UserId,
        artwork_id: ArtworkId,
    },
    FetchCart(UserId),
    FetchWishlist(UserId),
}

#[derive(Debug, Default)]
struct Tables {
    cart: Vec<(UserId, RemoteCartRow)>,
    wishlist: Vec<(UserId, ArtworkId)>,
    calls: Vec<MirrorCall>,
    /// Calls left before the mirror starts failing.
    budget: Option<usize>,
}

/// Remote mirror backed by in-memory tables.
///
/// Keeps the same `(user, artwork)` uniqueness as the real store and can be
/// switched offline to exercise failure paths.
#[derive(Debug)]
pub struct MemoryMirror {
    tables: Mutex<Tables>,
    available: AtomicBool,
}

impl Default for MemoryMirror {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryMirror {
    /// Create an empty, reachable mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`false`) or recovery (`true`). Recovery also
    /// drops any [`fail_after`](Self::fail_after) budget.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        if available {
            self.tables().budget = None;
        }
    }

    /// Let the next `calls` calls succeed, then fail every call after them.
    pub fn fail_after(&self, calls: usize) {
        self.tables().budget = Some(calls);
    }

    /// Insert a cart row directly, bypassing the call log.
    pub fn seed_cart(&self, user: &UserId, artwork_id: &ArtworkId, quantity: u32) {
        upsert(&mut self.tables().cart, user, artwork_id, quantity);
    }

    /// Insert a wishlist row directly, bypassing the call log.
    pub fn seed_wishlist(&self, user: &UserId, artwork_id: &ArtworkId) {
        let mut tables = self.tables();
        if !tables
            .wishlist
            .iter()
            .any(|(u, a)| u == user && a == artwork_id)
        {
            tables.wishlist.push((user.clone(), artwork_id.clone()));
        }
    }

    /// Current cart rows for a user.
    #[must_use]
    pub fn cart_rows(&self, user: &UserId) -> Vec<RemoteCartRow> {
        self.tables()
            .cart
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Current wishlist ids for a user.
    #[must_use]
    pub fn wishlist_ids(&self, user: &UserId) -> Vec<ArtworkId> {
        self.tables()
            .wishlist
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, a)| a.clone())
            .collect()
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<MirrorCall> {
        self.tables().calls.clone()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and decide whether it may proceed.
    fn admit(&self, call: MirrorCall) -> Result<MutexGuard<'_, Tables>, RemoteError> {
        let mut tables = self.tables();
        tables.calls.push(call);

        if !self.available.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("mirror offline".to_string()));
        }
        let budget = tables.budget;
        match budget {
            Some(0) => Err(RemoteError::Unavailable("mirror offline".to_string())),
            Some(n) => {
                tables.budget = Some(n - 1);
                Ok(tables)
            }
            None => Ok(tables),
        }
    }
}

fn upsert(
    rows: &mut Vec<(UserId, RemoteCartRow)>,
    user: &UserId,
    artwork_id: &ArtworkId,
    quantity: u32,
) {
    if let Some((_, row)) = rows
        .iter_mut()
        .find(|(u, row)| u == user && &row.artwork_id == artwork_id)
    {
        row.quantity = quantity;
    } else {
        rows.push((
            user.clone(),
            RemoteCartRow {
                artwork_id: artwork_id.clone(),
                quantity,
            },
        ));
    }
}

#[async_trait]
impl RemoteMirror for MemoryMirror {
    async fn upsert_cart_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let mut tables = self.admit(MirrorCall::UpsertCartItem {
            user: user.clone(),
            artwork_id: artwork_id.clone(),
            quantity,
        })?;
        upsert(&mut tables.cart, user, artwork_id, quantity);
        Ok(())
    }

    async fn update_cart_quantity(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        let mut tables = self.admit(MirrorCall::UpdateCartQuantity {
            user: user.clone(),
            artwork_id: artwork_id.clone(),
            quantity,
        })?;
        if let Some((_, row)) = tables
            .cart
            .iter_mut()
            .find(|(u, row)| u == user && &row.artwork_id == artwork_id)
        {
            row.quantity = quantity;
        }
        Ok(())
    }

    async fn delete_cart_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        let mut tables = self.admit(MirrorCall::DeleteCartItem {
            user: user.clone(),
            artwork_id: artwork_id.clone(),
        })?;
        tables
            .cart
            .retain(|(u, row)| !(u == user && &row.artwork_id == artwork_id));
        Ok(())
    }

    async fn insert_wishlist_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        let mut tables = self.admit(MirrorCall::InsertWishlistItem {
            user: user.clone(),
            artwork_id: artwork_id.clone(),
        })?;
        if !tables
            .wishlist
            .iter()
            .any(|(u, a)| u == user && a == artwork_id)
        {
            tables.wishlist.push((user.clone(), artwork_id.clone()));
        }
        Ok(())
    }

    async fn delete_wishlist_item(
        &self,
        user: &UserId,
        artwork_id: &ArtworkId,
    ) -> Result<(), RemoteError> {
        let mut tables = self.admit(MirrorCall::DeleteWishlistItem {
            user: user.clone(),
            artwork_id: artwork_id.clone(),
        })?;
        tables.wishlist.retain(|(u, a)| !(u == user && a == artwork_id));
        Ok(())
    }

    async fn fetch_cart(&self, user: &UserId) -> Result<Vec<RemoteCartRow>, RemoteError> {
        let tables = self.admit(MirrorCall::FetchCart(user.clone()))?;
        Ok(tables
            .cart
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn fetch_wishlist(&self, user: &UserId) -> Result<Vec<RemoteWishlistRow>, RemoteError> {
        let tables = self.admit(MirrorCall::FetchWishlist(user.clone()))?;
        Ok(tables
            .wishlist
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, a)| RemoteWishlistRow {
                artwork_id: a.clone(),
            })
            .collect())
    }
}
