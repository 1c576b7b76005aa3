//! Per-key single-flight registry.
//!
//! The first caller for a key becomes the leader and does the work; callers
//! arriving while it runs subscribe to the leader's result instead of
//! starting their own. The map lock is held only to join or leave, never
//! across the work itself.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

pub struct InFlight<K, V> {
    entries: Mutex<HashMap<K, (u64, broadcast::Sender<V>)>>,
    next_flight: AtomicU64,
}

pub enum Flight<'a, K: Eq + Hash + Clone, V: Clone> {
    Leader(FlightGuard<'a, K, V>),
    Follower(Waiter<V>),
}

/// Held by the leader. Dropping it without [`FlightGuard::complete`]
/// releases the key and wakes followers with no value.
pub struct FlightGuard<'a, K: Eq + Hash + Clone, V: Clone> {
    owner: &'a InFlight<K, V>,
    key: K,
    id: u64,
    done: bool,
}

pub struct Waiter<V: Clone> {
    rx: broadcast::Receiver<V>,
}

impl<K: Eq + Hash + Clone, V: Clone> Default for InFlight<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> InFlight<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_flight: AtomicU64::new(0),
        }
    }

    pub fn join(&self, key: K) -> Flight<'_, K, V> {
        let mut entries = self.entries.lock();
        if let Some((_, tx)) = entries.get(&key) {
            return Flight::Follower(Waiter { rx: tx.subscribe() });
        }

        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = broadcast::channel(1);
        entries.insert(key.clone(), (id, tx));
        Flight::Leader(FlightGuard { owner: self, key, id, done: false })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends every open flight, handing `value` to its followers. Leaders
    /// still running find their entry gone when they complete.
    pub fn abort_all(&self, value: V) -> usize {
        let drained: Vec<(K, (u64, broadcast::Sender<V>))> = self.entries.lock().drain().collect();
        for (_, (_, tx)) in &drained {
            let _ = tx.send(value.clone());
        }
        drained.len()
    }

    fn take(&self, key: &K, id: u64) -> Option<broadcast::Sender<V>> {
        let mut entries = self.entries.lock();
        let owned = entries.get(key).is_some_and(|(current, _)| *current == id);
        if owned {
            entries.remove(key).map(|(_, tx)| tx)
        } else {
            None
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> FlightGuard<'_, K, V> {
    /// Releases the key and hands `value` to every follower.
    pub fn complete(mut self, value: V) {
        self.done = true;
        if let Some(tx) = self.owner.take(&self.key, self.id) {
            // No receivers is fine: nobody joined.
            let _ = tx.send(value);
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for FlightGuard<'_, K, V> {
    fn drop(&mut self) {
        if !self.done {
            self.owner.take(&self.key, self.id);
        }
    }
}

impl<V: Clone> Waiter<V> {
    /// The leader's value, or `None` if the leader gave up.
    pub async fn wait(mut self) -> Option<V> {
        self.rx.recv().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_followers_get_leader_value() {
        let flights: InFlight<(i32, i32), u32> = InFlight::new();

        let Flight::Leader(leader) = flights.join((3, 3)) else { panic!("first caller must lead") };
        let Flight::Follower(a) = flights.join((3, 3)) else { panic!("second caller must follow") };
        let Flight::Follower(b) = flights.join((3, 3)) else { panic!("third caller must follow") };
        assert!(matches!(flights.join((4, 4)), Flight::Leader(_)));
        assert_eq!(flights.len(), 1);

        leader.complete(42);
        assert!(flights.is_empty());
        assert_eq!(a.wait().await, Some(42));
        assert_eq!(b.wait().await, Some(42));

        // Key is free again.
        assert!(matches!(flights.join((3, 3)), Flight::Leader(_)));
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_followers() {
        let flights: InFlight<u8, u8> = InFlight::new();
        let leader = flights.join(1);
        let Flight::Follower(waiter) = flights.join(1) else { panic!("expected follower") };
        drop(leader);
        assert_eq!(waiter.wait().await, None);
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn test_abort_all() {
        let flights: InFlight<u8, Result<u8, String>> = InFlight::new();
        let Flight::Leader(leader) = flights.join(1) else { panic!("expected leader") };
        let Flight::Follower(waiter) = flights.join(1) else { panic!("expected follower") };

        assert_eq!(flights.abort_all(Err("closing".into())), 1);
        assert_eq!(waiter.wait().await, Some(Err("closing".into())));

        // A new leader for the same key is not disturbed by the old one.
        let Flight::Leader(next) = flights.join(1) else { panic!("expected leader") };
        leader.complete(Ok(7));
        assert_eq!(flights.len(), 1);
        next.complete(Ok(8));
        assert!(flights.is_empty());
    }
}
