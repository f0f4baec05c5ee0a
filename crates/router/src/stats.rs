//! Router statistics: running counters reported by `/status`.

use serde::Serialize;
use std::sync::{PoisonError, RwLock};

/// Something worth counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Passed the ingestion boundary
    Ingested,
    /// Refused at the ingestion boundary
    Rejected,
    /// Updated context only
    ContextOnly,
    /// Pushed onto the admission queue
    Queued,
    /// Met the admission threshold
    Admitted,
    /// Popped below threshold
    BelowThreshold,
    /// Suppressed as a repeat of a recent reply
    Duplicate,
    /// Handed to the dispatch funnel
    Funneled,
    /// Reply delivered to the side channels
    Reply,
    /// Reply generation failed
    Failure,
    /// Speech shed because the TTS pool was saturated
    SpeechShed,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub ingested: u64,
    pub rejected: u64,
    pub context_only: u64,
    pub queued: u64,
    pub admitted: u64,
    pub below_threshold: u64,
    pub duplicates: u64,
    pub funneled: u64,
    pub replies: u64,
    pub failures: u64,
    pub speech_shed: u64,
}

/// Thread-safe counters shared by every router component.
#[derive(Debug, Default)]
pub struct RouterStats {
    totals: RwLock<StatsSnapshot>,
}

impl RouterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self, counter: Counter) {
        let mut t = self.totals.write().unwrap_or_else(PoisonError::into_inner);
        let slot = match counter {
            Counter::Ingested => &mut t.ingested,
            Counter::Rejected => &mut t.rejected,
            Counter::ContextOnly => &mut t.context_only,
            Counter::Queued => &mut t.queued,
            Counter::Admitted => &mut t.admitted,
            Counter::BelowThreshold => &mut t.below_threshold,
            Counter::Duplicate => &mut t.duplicates,
            Counter::Funneled => &mut t.funneled,
            Counter::Reply => &mut t.replies,
            Counter::Failure => &mut t.failures,
            Counter::SpeechShed => &mut t.speech_shed,
        };
        *slot += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.totals.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_are_independent() {
        let stats = RouterStats::new();
        stats.bump(Counter::Ingested);
        stats.bump(Counter::Ingested);
        stats.bump(Counter::Duplicate);
        let snap = stats.snapshot();
        assert_eq!(snap.ingested, 2);
        assert_eq!(snap.duplicates, 1);
        assert_eq!(snap.replies, 0);
    }

    #[test]
    fn concurrent_bumps_are_not_lost() {
        let stats = Arc::new(RouterStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        stats.bump(Counter::Queued);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().queued, 1000);
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_value(RouterStats::new().snapshot()).unwrap();
        assert_eq!(json["below_threshold"], 0);
    }
}
