//! Wishlist commands.

use atelier_cart::{CartContext, SyncError};
use atelier_core::ArtworkId;

/// Save an artwork.
pub async fn add(context: &CartContext, artwork_id: &ArtworkId) -> Result<(), SyncError> {
    context.controller().add_to_wishlist(artwork_id).await
}

/// Remove a saved artwork.
pub async fn remove(context: &CartContext, artwork_id: &ArtworkId) -> Result<(), SyncError> {
    context.controller().remove_from_wishlist(artwork_id).await
}

/// Save the artwork if it is not saved, otherwise remove it.
pub async fn toggle(context: &CartContext, artwork_id: &ArtworkId) -> Result<(), SyncError> {
    let saved = context.controller().toggle_wishlist(artwork_id).await?;
    if saved {
        tracing::info!("Saved {artwork_id}");
    } else {
        tracing::info!("Removed {artwork_id} from wishlist");
    }
    Ok(())
}
