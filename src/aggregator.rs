use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::event::{ActorRates, DamageDirection};
use crate::store::SharedEventStore;

/// Rolling-window rate queries against a shared event store.
///
/// Windows are evaluated lazily at query time: a linear scan over the
/// retained events, bounded by the retention window's volume, instead of
/// incrementally maintained sums that can drift. Eviction always uses the
/// configured retention (the longest window any caller queries), never the
/// queried window, so a short responsive window and a long smoothing window
/// can share one store without interfering.
#[derive(Clone)]
pub struct DpsAggregator {
    store: SharedEventStore,
    retention: Duration,
}

impl DpsAggregator {
    /// `retention` must cover the longest window this aggregator will be
    /// asked about; events older than `now - retention` are discarded.
    pub fn new(store: SharedEventStore, retention: Duration) -> Self {
        Self { store, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Total damage per second over the trailing `window`, both directions
    /// combined. Returns 0.0 when no events fall inside the window.
    pub fn total_rate(&self, window: Duration) -> f64 {
        self.total_rate_at(Instant::now(), window)
    }

    pub fn total_rate_at(&self, now: Instant, window: Duration) -> f64 {
        if !valid_window(window) {
            return 0.0;
        }

        self.evict_expired(now);

        let store = self.store.read();
        let total: u64 = match now.checked_sub(window) {
            Some(window_start) => store.events_since(window_start).map(|e| e.amount).sum(),
            // The process is younger than the window; everything qualifies.
            None => store.iter().map(|e| e.amount).sum(),
        };

        total as f64 / window.as_secs_f64()
    }

    /// Per-actor rates over the trailing `window`, split into incoming and
    /// outgoing damage. Actors with no events inside the window are absent.
    pub fn rate_by_actor(&self, window: Duration) -> BTreeMap<String, ActorRates> {
        self.rate_by_actor_at(Instant::now(), window)
    }

    pub fn rate_by_actor_at(&self, now: Instant, window: Duration) -> BTreeMap<String, ActorRates> {
        if !valid_window(window) {
            return BTreeMap::new();
        }

        self.evict_expired(now);

        let store = self.store.read();
        let seconds = window.as_secs_f64();
        let mut rates: BTreeMap<String, ActorRates> = BTreeMap::new();

        let mut tally = |event: &crate::event::DamageEvent| {
            let entry = rates.entry(event.actor.clone()).or_default();
            match event.direction {
                DamageDirection::Incoming => entry.incoming_rate += event.amount as f64 / seconds,
                DamageDirection::Outgoing => entry.outgoing_rate += event.amount as f64 / seconds,
            }
        };

        match now.checked_sub(window) {
            Some(window_start) => store.events_since(window_start).for_each(&mut tally),
            None => store.iter().for_each(&mut tally),
        }

        rates
    }

    /// Retention eviction, under a write lock held only for the O(evicted)
    /// prefix drop. The scan that follows shares a read lock with other
    /// queries, so queries never serialize against each other.
    fn evict_expired(&self, now: Instant) {
        if let Some(cutoff) = now.checked_sub(self.retention) {
            self.store.write().evict_older_than(cutoff);
        }
    }
}

fn valid_window(window: Duration) -> bool {
    if window.is_zero() {
        tracing::warn!("ignoring rate query with a zero-length window");
        return false;
    }
    true
}
