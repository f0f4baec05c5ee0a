//! Heuristic priority scoring.
//!
//! A score starts at the source's prior weight and is adjusted for how
//! fresh the event is, what the producer says about relevance and urgency,
//! whether it continues the recent conversation, and how recently the bot
//! last replied. Scores are open-ended and only ever compared to thresholds.

use chrono::{DateTime, Utc};
use nami_config::{ScoringConfig, SourceWeightConfig};
use nami_core::input::InputEvent;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    weights: SourceWeightConfig,
    config: ScoringConfig,
}

/// Each term that went into a score, for dry runs and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub recency: f64,
    pub relevance: f64,
    pub urgency: f64,
    pub continuity: f64,
    pub cooldown: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.base + self.recency + self.relevance + self.urgency + self.continuity - self.cooldown
    }
}

impl Scorer {
    pub fn new(weights: SourceWeightConfig, config: ScoringConfig) -> Self {
        Self { weights, config }
    }

    pub fn weights(&self) -> &SourceWeightConfig {
        &self.weights
    }

    pub fn score(
        &self,
        event: &InputEvent,
        recent: &[InputEvent],
        last_response: Option<DateTime<Utc>>,
    ) -> f64 {
        self.score_at(event, recent, last_response, Utc::now())
    }

    /// Score `event` as of `now`. `recent` is oldest first; only its tail
    /// is consulted for continuity.
    pub fn score_at(
        &self,
        event: &InputEvent,
        recent: &[InputEvent],
        last_response: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> f64 {
        self.breakdown_at(event, recent, last_response, now).total()
    }

    pub fn breakdown_at(
        &self,
        event: &InputEvent,
        recent: &[InputEvent],
        last_response: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ScoreBreakdown {
        let cfg = &self.config;

        let age = seconds_between(event.timestamp, now);
        let recency_factor = (1.0 - (age / cfg.recency_window_secs).min(1.0)).max(0.0);

        let continuity = if self.continues(event, recent) {
            cfg.continuity_bonus
        } else {
            0.0
        };

        let cooldown = match last_response {
            Some(at) => {
                let since = seconds_between(at, now);
                if since < cfg.cooldown_secs {
                    cfg.cooldown_penalty * (1.0 - since / cfg.cooldown_secs).max(0.0)
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        ScoreBreakdown {
            base: self.weights.for_source(event.source),
            recency: recency_factor * cfg.recency_weight,
            relevance: event.metadata.relevance.unwrap_or(0.0) * cfg.relevance_weight,
            urgency: event.metadata.urgency.unwrap_or(0.0) * cfg.urgency_weight,
            continuity,
            cooldown,
        }
    }

    /// True when `event` shares a substantial word with one of the last few
    /// recent events.
    pub fn continues(&self, event: &InputEvent, recent: &[InputEvent]) -> bool {
        let lookback = self.config.continuity_lookback;
        let start = recent.len().saturating_sub(lookback);
        let recent_words: HashSet<String> = recent[start..]
            .iter()
            .flat_map(|e| self.substantial_words(&e.text))
            .collect();
        if recent_words.is_empty() {
            return false;
        }
        self.substantial_words(&event.text)
            .any(|w| recent_words.contains(&w))
    }

    fn substantial_words<'a>(&self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        let min_len = self.config.continuity_min_word_len;
        text.split_whitespace()
            .map(str::to_lowercase)
            .filter(move |w| w.chars().count() > min_len)
    }
}

/// Seconds from `earlier` to `later`, never negative.
fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let millis = (later - earlier).num_milliseconds().max(0);
    millis as f64 / 1000.0
}
