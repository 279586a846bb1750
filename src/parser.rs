use regex::Regex;

use crate::event::{DamageDirection, DamageHit};

/// One text grammar for combat log lines. Implementations must be pure: one
/// line in, zero or one hit out, no side effects.
pub trait CombatLineParser: Send + Sync {
    /// Returns `None` for any line the grammar does not recognize. A
    /// non-matching line is expected, not an error.
    fn parse(&self, line: &str) -> Option<DamageHit>;
}

/// English combat line grammar: a `(combat)` marker, a bold damage amount,
/// a `to`/`from` direction keyword, and the other party's colored name tag.
pub struct EnglishLogParser {
    pattern: Regex,
}

const ENGLISH_DAMAGE_PATTERN: &str =
    r"(?i)\(combat\).*?<b>(\d+)</b>.*?\b(to|from)\b.*?<b><color[^>]*>([^<]+)";

impl EnglishLogParser {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(ENGLISH_DAMAGE_PATTERN).expect("damage pattern is valid"),
        }
    }
}

impl Default for EnglishLogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatLineParser for EnglishLogParser {
    fn parse(&self, line: &str) -> Option<DamageHit> {
        let captures = self.pattern.captures(line)?;

        let amount = captures[1].parse().ok()?;
        let direction = match captures[2].to_ascii_lowercase().as_str() {
            "to" => DamageDirection::Outgoing,
            "from" => DamageDirection::Incoming,
            _ => return None,
        };
        let actor = captures[3].trim().to_string();
        if actor.is_empty() {
            return None;
        }

        Some(DamageHit {
            amount,
            direction,
            actor,
        })
    }
}
