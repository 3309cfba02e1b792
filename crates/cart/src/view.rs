//! Read models derived from an [`AppState`] snapshot.
//!
//! Views never own state; they are rebuilt from a fresh snapshot whenever a
//! notification arrives.

use atelier_core::{ArtworkId, apply_discount, line_total, round_money};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::store::{AppState, CartEntry};

/// One cart line ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub artwork_id: ArtworkId,
    pub title: String,
    pub artist: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_price: Decimal,
}

impl From<&CartEntry> for CartLineView {
    fn from(entry: &CartEntry) -> Self {
        Self {
            artwork_id: entry.artwork.id.clone(),
            title: entry.artwork.title.clone(),
            artist: entry.artwork.artist.clone(),
            image_url: entry.artwork.image_url.clone(),
            quantity: entry.quantity,
            unit_price: entry.artwork.price,
            line_price: line_total(entry.artwork.price, entry.quantity),
        }
    }
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u64,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,
}

impl CartView {
    /// Returns `true` if there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<&AppState> for CartView {
    fn from(state: &AppState) -> Self {
        let lines: Vec<CartLineView> = state.cart.entries().iter().map(CartLineView::from).collect();
        let subtotal = round_money(lines.iter().map(|l| l.line_price).sum());
        let discount = state
            .coupon
            .as_ref()
            .map_or(Decimal::ZERO, |c| apply_discount(subtotal, c.discount_percent()));

        Self {
            lines,
            item_count: state.cart.item_count(),
            subtotal,
            discount,
            total: subtotal - discount,
            coupon_code: state.coupon.as_ref().map(|c| c.code().to_string()),
        }
    }
}

/// Counters for header badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BadgeCounts {
    /// Total units in the cart.
    pub cart_count: u64,
    /// Saved artworks.
    pub wishlist_count: usize,
}

impl From<&AppState> for BadgeCounts {
    fn from(state: &AppState) -> Self {
        Self {
            cart_count: state.cart.item_count(),
            wishlist_count: state.wishlist.len(),
        }
    }
}
