//! Signed-in sessions: every mutation is confirmed by the remote first.

#![allow(clippy::unwrap_used)]

use atelier_cart::{LoginPolicy, MirrorCall, RemoteError, SyncError};
use atelier_core::{ArtworkId, Identity, UserId};
use atelier_integration_tests::{Session, artwork};

async fn signed_in() -> (Session, UserId) {
    let session = Session::start(LoginPolicy::KeepLocal);
    let user = UserId::new("user-1");
    session
        .context
        .mount(Identity::User(user.clone()))
        .await
        .unwrap();
    (session, user)
}

#[tokio::test]
async fn test_remove_while_remote_unreachable_keeps_entry() {
    let (session, _) = signed_in().await;
    let controller = session.context.controller();
    controller.add_to_cart(&artwork("A1", 500)).await.unwrap();

    session.mirror.set_available(false);
    let err = controller
        .remove_from_cart(&ArtworkId::new("A1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::RemoteUnavailable(_)));
    assert_eq!(
        err.user_message(),
        "We couldn't update your cart. Please try again."
    );
    assert!(session.context.snapshot().cart.contains(&ArtworkId::new("A1")));
}

#[tokio::test]
async fn test_failed_upsert_leaves_state_identical() {
    let (session, _) = signed_in().await;
    let controller = session.context.controller();
    controller.add_to_cart(&artwork("A1", 500)).await.unwrap();
    controller
        .add_to_wishlist(&ArtworkId::new("A2"))
        .await
        .unwrap();
    let before = session.context.snapshot();

    session.mirror.set_available(false);
    assert!(controller.add_to_cart(&artwork("A1", 500)).await.is_err());
    assert!(controller.add_to_cart(&artwork("A3", 1200)).await.is_err());
    assert!(
        controller
            .update_quantity(&ArtworkId::new("A1"), 7)
            .await
            .is_err()
    );

    assert_eq!(session.context.snapshot(), before);
}

#[tokio::test]
async fn test_signed_in_mutations_never_touch_ledger() {
    let (session, user) = signed_in().await;
    let controller = session.context.controller();

    controller.add_to_cart(&artwork("A1", 500)).await.unwrap();
    controller.add_to_cart(&artwork("A1", 500)).await.unwrap();
    controller
        .update_quantity(&ArtworkId::new("A1"), 5)
        .await
        .unwrap();
    controller
        .add_to_wishlist(&ArtworkId::new("A3"))
        .await
        .unwrap();

    assert!(session.context.ledger().snapshot().is_empty());
    assert_eq!(session.mirror.cart_rows(&user)[0].quantity, 5);
    assert_eq!(session.mirror.wishlist_ids(&user), vec![ArtworkId::new("A3")]);
    assert!(session.mirror.calls().contains(&MirrorCall::UpsertCartItem {
        user,
        artwork_id: ArtworkId::new("A1"),
        quantity: 5,
    }));
}

#[tokio::test]
async fn test_remote_state_reloads_on_next_mount() {
    let (session, user) = signed_in().await;
    let controller = session.context.controller();
    controller.add_to_cart(&artwork("A2", 250)).await.unwrap();
    controller.add_to_cart(&artwork("A2", 250)).await.unwrap();
    controller
        .add_to_wishlist(&ArtworkId::new("A1"))
        .await
        .unwrap();

    let reloaded = session.reload();
    let report = reloaded
        .context
        .mount(Identity::User(user))
        .await
        .unwrap();

    let state = reloaded.context.snapshot();
    assert_eq!(report.units, 2);
    assert_eq!(state.cart.quantity_of(&ArtworkId::new("A2")), Some(2));
    assert!(state.wishlist.contains(&ArtworkId::new("A1")));
}

#[tokio::test]
async fn test_recovery_after_outage() {
    let (session, user) = signed_in().await;
    let controller = session.context.controller();

    session.mirror.set_available(false);
    let err = controller.add_to_cart(&artwork("A1", 500)).await.unwrap_err();
    assert!(err.is_retryable());

    session.mirror.set_available(true);
    controller.add_to_cart(&artwork("A1", 500)).await.unwrap();

    assert_eq!(
        session.context.snapshot().cart.quantity_of(&ArtworkId::new("A1")),
        Some(1)
    );
    assert_eq!(session.mirror.cart_rows(&user)[0].quantity, 1);
}

#[tokio::test]
async fn test_outage_fails_closed() {
    let (session, _) = signed_in().await;
    session.mirror.set_available(false);

    // An empty cart has nothing to delete remotely.
    session.context.controller().clear_cart().await.unwrap();

    let err = session
        .context
        .controller()
        .add_to_wishlist(&ArtworkId::new("A1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::RemoteUnavailable(RemoteError::Unavailable(_))
    ));
}
