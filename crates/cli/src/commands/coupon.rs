//! Coupon commands.

use atelier_cart::{CartContext, SyncError};
use rust_decimal::Decimal;

/// Validate and apply a percentage coupon.
pub async fn apply(context: &CartContext, code: &str, percent: Decimal) -> Result<(), SyncError> {
    let coupon = context.controller().apply_coupon(code, percent).await?;
    tracing::info!("Applied {coupon}");
    Ok(())
}

/// Remove the applied coupon.
pub async fn remove(context: &CartContext) -> Result<(), SyncError> {
    context.controller().remove_coupon().await
}
