//! Real-time DPS tracking core for EVE Online combat logs: tails growing log
//! files in the game's log directory, extracts damage events from matching
//! lines, and answers rolling-window rate queries for a display layer.
//!
//! The crate has no UI or transport of its own. A consumer wires the pieces
//! together: discover the directory, create a shared store, start a
//! [`watcher::LogDirectoryWatcher`], and sample a [`aggregator::DpsAggregator`]
//! (directly or through a [`publisher::DpsPublisher`]).

pub mod aggregator;
pub mod error;
pub mod event;
pub mod log_dir;
pub mod parser;
pub mod publisher;
pub mod store;
pub mod tracker;
pub mod watcher;

pub use aggregator::DpsAggregator;
pub use error::WatchError;
pub use event::{ActorRates, DamageDirection, DamageEvent, DamageHit};
pub use log_dir::find_game_log_directory;
pub use parser::{CombatLineParser, EnglishLogParser};
pub use publisher::{DpsPublisher, DpsSample, MetricsSink, PublisherConfig};
pub use store::{shared_event_store, DamageEventStore, SharedEventStore};
pub use tracker::{ByteRange, FilePositionTracker, PollOutcome};
pub use watcher::{LogDirectoryWatcher, LogWatchHandle, WatcherConfig};
