use serde::Serialize;
use std::time::Instant;

/// Which way the damage flowed relative to the tracked character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DamageDirection {
    /// Damage dealt by the tracked character (`to` in the log grammar).
    Outgoing,
    /// Damage received by the tracked character (`from` in the log grammar).
    Incoming,
}

/// A damage line as extracted from raw log text, before an observation
/// timestamp is attached. Parsers are pure; the ingestion path owns the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageHit {
    pub amount: u64,
    pub direction: DamageDirection,
    /// The other party: the target when outgoing, the attacker when incoming.
    pub actor: String,
}

/// One stored combat event. Immutable after append; dropped once it falls out
/// of the longest retained window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageEvent {
    /// Monotonic instant the line was observed (not the in-game time).
    pub timestamp: Instant,
    pub amount: u64,
    pub direction: DamageDirection,
    pub actor: String,
}

impl DamageEvent {
    pub fn observed(hit: DamageHit, timestamp: Instant) -> Self {
        Self {
            timestamp,
            amount: hit.amount,
            direction: hit.direction,
            actor: hit.actor,
        }
    }
}

/// Per-actor rates over one query window, split by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRates {
    pub incoming_rate: f64,
    pub outgoing_rate: f64,
}
