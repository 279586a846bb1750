use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::event::DamageEvent;

/// Append-only, timestamp-ordered buffer of recent combat events.
///
/// The single ingestion task appends at the back; eviction only ever removes
/// a prefix from the front, so the deque stays ordered and range queries can
/// binary-search the window boundary.
#[derive(Debug, Default)]
pub struct DamageEventStore {
    events: VecDeque<DamageEvent>,
}

impl DamageEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1) amortized. The caller delivers events in non-decreasing timestamp
    /// order; the single sequential ingestion path guarantees this.
    pub fn append(&mut self, event: DamageEvent) {
        debug_assert!(
            self.events
                .back()
                .map(|last| last.timestamp <= event.timestamp)
                .unwrap_or(true),
            "events must arrive in non-decreasing timestamp order"
        );
        self.events.push_back(event);
    }

    /// Removes every event strictly older than `cutoff`. O(evicted).
    pub fn evict_older_than(&mut self, cutoff: Instant) -> usize {
        let mut evicted = 0;
        while self
            .events
            .front()
            .map(|event| event.timestamp < cutoff)
            .unwrap_or(false)
        {
            self.events.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// All events with `timestamp >= window_start`, oldest first.
    pub fn events_since(&self, window_start: Instant) -> impl Iterator<Item = &DamageEvent> {
        let first = self
            .events
            .partition_point(|event| event.timestamp < window_start);
        self.events.iter().skip(first)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DamageEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Shared handle: one writer (the watch task), any number of concurrent
/// readers. Neither side holds the lock across I/O.
pub type SharedEventStore = Arc<RwLock<DamageEventStore>>;

pub fn shared_event_store() -> SharedEventStore {
    Arc::new(RwLock::new(DamageEventStore::new()))
}

#[cfg(test)]
mod tests {
    use super::DamageEventStore;
    use crate::event::{DamageDirection, DamageEvent};
    use std::time::{Duration, Instant};

    fn event_at(timestamp: Instant, amount: u64) -> DamageEvent {
        DamageEvent {
            timestamp,
            amount,
            direction: DamageDirection::Outgoing,
            actor: "Alpha".to_string(),
        }
    }

    #[test]
    fn eviction_removes_only_the_stale_prefix() {
        let start = Instant::now();
        let mut store = DamageEventStore::new();
        store.append(event_at(start, 1));
        store.append(event_at(start + Duration::from_secs(5), 2));
        store.append(event_at(start + Duration::from_secs(10), 3));

        let evicted = store.evict_older_than(start + Duration::from_secs(5));

        assert_eq!(evicted, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.iter().next().unwrap().amount, 2);
    }

    #[test]
    fn events_since_binary_searches_the_window_boundary() {
        let start = Instant::now();
        let mut store = DamageEventStore::new();
        for seconds in 0..10 {
            store.append(event_at(start + Duration::from_secs(seconds), seconds));
        }

        let amounts: Vec<u64> = store
            .events_since(start + Duration::from_secs(7))
            .map(|event| event.amount)
            .collect();

        assert_eq!(amounts, vec![7, 8, 9]);
    }

    #[test]
    fn eviction_on_empty_store_is_a_no_op() {
        let mut store = DamageEventStore::new();
        assert_eq!(store.evict_older_than(Instant::now()), 0);
        assert!(store.is_empty());
    }
}
