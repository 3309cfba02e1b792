//! Cart commands.

use atelier_cart::{CartContext, SyncError};
use atelier_core::ArtworkId;

/// Add one unit of an artwork looked up in the catalog.
pub async fn add(context: &CartContext, artwork_id: &ArtworkId) -> Result<(), SyncError> {
    let artwork = context.controller().add_to_cart_by_id(artwork_id).await?;
    tracing::info!("Added {} by {}", artwork.title, artwork.artist);
    Ok(())
}

/// Remove an artwork's line.
pub async fn remove(context: &CartContext, artwork_id: &ArtworkId) -> Result<(), SyncError> {
    context.controller().remove_from_cart(artwork_id).await
}

/// Set the quantity of an artwork already in the cart.
pub async fn set(
    context: &CartContext,
    artwork_id: &ArtworkId,
    quantity: i64,
) -> Result<(), SyncError> {
    context
        .controller()
        .update_quantity(artwork_id, quantity)
        .await
}

/// Empty the cart.
pub async fn clear(context: &CartContext) -> Result<(), SyncError> {
    context.controller().clear_cart().await
}
