//! Render the current session.

use std::fmt::Write;

use atelier_cart::{AppState, BadgeCounts, CartContext, CartView};

/// Print the cart, wishlist and badge counts on stdout.
#[allow(clippy::print_stdout)]
pub fn print(context: &CartContext) {
    print!("{}", render(&context.snapshot()));
}

/// Plain-text rendering of a snapshot.
fn render(state: &AppState) -> String {
    let view = CartView::from(state);
    let badges = BadgeCounts::from(state);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Session: {}", state.identity);
    let _ = writeln!(
        out,
        "Cart ({} items, {} saved)",
        badges.cart_count, badges.wishlist_count
    );

    if view.is_empty() {
        let _ = writeln!(out, "  (empty)");
    }
    for line in &view.lines {
        let _ = writeln!(
            out,
            "  {:<8} {} by {}  {} x {:.2} = {:.2}",
            line.artwork_id, line.title, line.artist, line.quantity, line.unit_price, line.line_price
        );
    }

    let _ = writeln!(out, "Subtotal: {:.2}", view.subtotal);
    if let Some(code) = &view.coupon_code {
        let _ = writeln!(out, "Coupon {code}: -{:.2}", view.discount);
    }
    let _ = writeln!(out, "Total: {:.2}", view.total);

    if !state.wishlist.is_empty() {
        let _ = writeln!(out, "Wishlist:");
        for artwork_id in state.wishlist.artwork_ids() {
            let _ = writeln!(out, "  {artwork_id}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_cart::Action;
    use atelier_cart::store::reduce;
    use atelier_core::{Artwork, ArtworkId};
    use rust_decimal::Decimal;

    #[test]
    fn test_render_lines_and_totals() {
        let artwork = Artwork {
            id: ArtworkId::new("A1"),
            title: "Dusk".to_string(),
            artist: "M. Rowe".to_string(),
            price: Decimal::new(500, 0),
            image_url: None,
        };
        let state = [
            Action::AddToCart(artwork.clone()),
            Action::AddToCart(artwork),
        ]
        .iter()
        .fold(AppState::default(), reduce);

        let out = render(&state);
        assert!(out.contains("Session: anonymous"));
        assert!(out.contains("Cart (2 items, 0 saved)"));
        assert!(out.contains("Dusk by M. Rowe  2 x 500.00 = 1000.00"));
        assert!(out.contains("Total: 1000.00"));
    }

    #[test]
    fn test_render_empty() {
        let out = render(&AppState::default());
        assert!(out.contains("(empty)"));
        assert!(!out.contains("Wishlist:"));
    }
}
