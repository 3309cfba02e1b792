//! Atelier Core - Shared types library.
//!
//! This crate provides the domain types used across all Atelier components:
//! - `cart` - Client-resident cart and wishlist synchronization engine
//! - `cli` - Command-line front end driving the engine
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, identity, artwork snapshots, prices and coupons

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
