//! Core types for Atelier.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod artwork;
pub mod coupon;
pub mod id;
pub mod identity;
pub mod price;

pub use artwork::Artwork;
pub use coupon::{Coupon, CouponError};
pub use id::*;
pub use identity::Identity;
pub use price::{apply_discount, line_total, round_money};
