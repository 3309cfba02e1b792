//! Process-wide change notifications.
//!
//! Independently mounted consumers (badge counters, drawers, other views)
//! subscribe to a [`Topic`] and are called back synchronously when a mutation
//! publishes it. Subscriptions are guards: dropping one unsubscribes, so a
//! consumer's listener lives exactly as long as the consumer holds it.
//!
//! Async consumers can instead [`watch`](Broadcaster::watch) a channel that
//! receives every published topic.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the async watch channel. Slow receivers see `Lagged`.
const WATCH_CAPACITY: usize = 64;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    CartChanged,
    WishlistChanged,
    /// Another process or context rewrote the shared guest ledger.
    ExternalStorageChanged,
}

impl Topic {
    /// Human-readable topic name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CartChanged => "cart changed",
            Self::WishlistChanged => "wishlist changed",
            Self::ExternalStorageChanged => "external storage changed",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Listener = Arc<dyn Fn(Topic) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Topic, Listener)>,
}

struct Shared {
    registry: Mutex<Registry>,
    sender: broadcast::Sender<Topic>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publish/subscribe hub shared by every component of one session.
///
/// Cloning is cheap and yields a handle to the same hub.
#[derive(Clone)]
pub struct Broadcaster {
    shared: Arc<Shared>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                sender,
            }),
        }
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("listeners", &self.shared.registry().listeners.len())
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `topic`.
    ///
    /// Listeners for a topic run in subscription order. They are called
    /// without any internal lock held, so a listener may itself publish,
    /// subscribe or drop subscriptions.
    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> Subscription
    where
        F: Fn(Topic) + Send + Sync + 'static,
    {
        let mut registry = self.shared.registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, topic, Arc::new(listener)));

        Subscription {
            id,
            topic,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Receive every published topic asynchronously.
    #[must_use]
    pub fn watch(&self) -> broadcast::Receiver<Topic> {
        self.shared.sender.subscribe()
    }

    /// Notify every listener of `topic`. Returns how many were called.
    pub fn publish(&self, topic: Topic) -> usize {
        let listeners: Vec<Listener> = self
            .shared
            .registry()
            .listeners
            .iter()
            .filter(|(_, t, _)| *t == topic)
            .map(|(_, _, l)| Arc::clone(l))
            .collect();

        for listener in &listeners {
            listener(topic);
        }

        // No watchers is not an error.
        let _ = self.shared.sender.send(topic);

        trace!(%topic, listeners = listeners.len(), "published");
        listeners.len()
    }

    /// Number of live synchronous listeners for `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: Topic) -> usize {
        self.shared
            .registry()
            .listeners
            .iter()
            .filter(|(_, t, _)| *t == topic)
            .count()
    }
}

/// A live subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    topic: Topic,
    shared: Weak<Shared>,
}

impl Subscription {
    /// The topic this subscription listens to.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        self.topic
    }

    /// Stop listening now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.registry().listeners.retain(|(id, _, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(broadcaster: &Broadcaster, topic: Topic) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = broadcaster.subscribe(topic, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_publish_reaches_only_matching_topic() {
        let broadcaster = Broadcaster::new();
        let (cart, _cart_sub) = counter(&broadcaster, Topic::CartChanged);
        let (wishlist, _wishlist_sub) = counter(&broadcaster, Topic::WishlistChanged);

        assert_eq!(broadcaster.publish(Topic::CartChanged), 1);
        assert_eq!(broadcaster.publish(Topic::CartChanged), 1);

        assert_eq!(cart.load(Ordering::SeqCst), 2);
        assert_eq!(wishlist.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let broadcaster = Broadcaster::new();
        let (count, sub) = counter(&broadcaster, Topic::CartChanged);
        assert_eq!(broadcaster.listener_count(Topic::CartChanged), 1);

        drop(sub);
        assert_eq!(broadcaster.listener_count(Topic::CartChanged), 0);
        assert_eq!(broadcaster.publish(Topic::CartChanged), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let broadcaster = Broadcaster::new();
        let (_, sub) = counter(&broadcaster, Topic::WishlistChanged);
        sub.unsubscribe();
        assert_eq!(broadcaster.listener_count(Topic::WishlistChanged), 0);
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let broadcaster = Broadcaster::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = (0..3)
            .map(|i| {
                let order = order.clone();
                broadcaster.subscribe(Topic::CartChanged, move |_| {
                    order.lock().unwrap().push(i);
                })
            })
            .collect();

        broadcaster.publish(Topic::CartChanged);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn test_listener_may_subscribe_reentrantly() {
        let broadcaster = Broadcaster::new();
        let inner_subs = Arc::new(Mutex::new(Vec::new()));

        let hub = broadcaster.clone();
        let held = inner_subs.clone();
        let _sub = broadcaster.subscribe(Topic::CartChanged, move |_| {
            let sub = hub.subscribe(Topic::WishlistChanged, |_| {});
            held.lock().unwrap().push(sub);
        });

        broadcaster.publish(Topic::CartChanged);
        assert_eq!(broadcaster.listener_count(Topic::WishlistChanged), 1);
    }

    #[test]
    fn test_subscription_outliving_broadcaster() {
        let broadcaster = Broadcaster::new();
        let (_, sub) = counter(&broadcaster, Topic::CartChanged);
        drop(broadcaster);
        drop(sub);
    }

    #[tokio::test]
    async fn test_watch_receives_topics() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.watch();

        broadcaster.publish(Topic::ExternalStorageChanged);
        broadcaster.publish(Topic::CartChanged);

        assert_eq!(rx.recv().await.unwrap(), Topic::ExternalStorageChanged);
        assert_eq!(rx.recv().await.unwrap(), Topic::CartChanged);
    }
}
