use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::aggregator::DpsAggregator;
use crate::event::ActorRates;

/// One published measurement: every rate for one window at one sampling tick.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DpsSample {
    pub sampled_at: DateTime<Utc>,
    pub window_seconds: f64,
    pub total_rate: f64,
    pub by_actor: BTreeMap<String, ActorRates>,
}

/// Display/transport boundary. Implementations receive one sample per
/// configured window per tick and forward it outward (IPC, UI, test buffer).
pub trait MetricsSink: Send + Sync {
    fn publish(&self, sample: &DpsSample);
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub tick: Duration,
    /// Window sizes sampled on every tick. A short responsive window and a
    /// long smoothing window by default.
    pub windows: Vec<Duration>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1_000),
            windows: vec![Duration::from_secs(3), Duration::from_secs(60)],
        }
    }
}

impl PublisherConfig {
    /// The retention the aggregator needs so none of these windows loses
    /// events to eviction.
    pub fn max_window(&self) -> Duration {
        self.windows.iter().copied().max().unwrap_or(Duration::ZERO)
    }
}

/// Periodic sampler: queries the aggregator on a fixed interval and hands the
/// results to a [`MetricsSink`].
pub struct DpsPublisher {
    handle: JoinHandle<()>,
}

impl DpsPublisher {
    pub fn start(
        aggregator: DpsAggregator,
        sink: Arc<dyn MetricsSink>,
        config: PublisherConfig,
    ) -> Self {
        let tick = if config.tick.is_zero() {
            tracing::warn!("zero publisher tick requested, falling back to 1000 ms");
            Duration::from_millis(1_000)
        } else {
            config.tick
        };

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for &window in &config.windows {
                    let sample = DpsSample {
                        sampled_at: Utc::now(),
                        window_seconds: window.as_secs_f64(),
                        total_rate: aggregator.total_rate(window),
                        by_actor: aggregator.rate_by_actor(window),
                    };
                    sink.publish(&sample);
                }
            }
        });

        Self { handle }
    }

    /// Stops the sampler and waits for its task to terminate; no sample is
    /// published once this returns.
    pub async fn stop(self) {
        self.handle.abort();
        // An aborted task resolves to a cancellation JoinError; expected.
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
