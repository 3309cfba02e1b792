//! Artwork snapshot carried alongside cart entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ArtworkId;

/// A denormalized copy of a catalog artwork.
///
/// The cart keeps this snapshot from the moment of addition so lists and
/// totals render without a second catalog lookup. The JSON form is the one
/// written to the guest ledger, so the price stays a plain number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    /// Catalog key.
    pub id: ArtworkId,
    /// Display title.
    pub title: String,
    /// Artist name.
    pub artist: String,
    /// Unit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Thumbnail URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
