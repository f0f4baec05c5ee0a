//! Recent-response log used to avoid answering the same stimulus twice.

use nami_config::DedupConfig;
use nami_core::source::SourceKind;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone)]
struct Record {
    source: SourceKind,
    key: String,
}

/// Bounded FIFO of `(source, normalized prefix)` pairs. Only the same
/// source counts as a repeat.
pub struct RecentResponseLog {
    config: DedupConfig,
    records: Mutex<VecDeque<Record>>,
}

impl RecentResponseLog {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            records: Mutex::new(VecDeque::with_capacity(config.capacity + 1)),
        }
    }

    /// First `prefix_chars` characters, lowercased and trimmed.
    pub fn normalize(&self, text: &str) -> String {
        normalize(text, self.config.prefix_chars)
    }

    /// Record `(source, text)` unless it is already present.
    ///
    /// Returns `false` for a repeat. Check and insert happen under one lock,
    /// so two racing callers cannot both get `true`.
    pub fn check_and_record(&self, source: SourceKind, text: &str) -> bool {
        let key = self.normalize(text);
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.iter().any(|r| r.source == source && r.key == key) {
            return false;
        }
        records.push_back(Record { source, key });
        while records.len() > self.config.capacity {
            records.pop_front();
        }
        true
    }

    /// Drop the record for `(source, text)` so the same input can be
    /// answered again. Returns whether a record was removed.
    pub fn forget(&self, source: SourceKind, text: &str) -> bool {
        let key = self.normalize(text);
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match records.iter().position(|r| r.source == source && r.key == key) {
            Some(index) => records.remove(index).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecentResponseLog {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

fn normalize(text: &str, prefix_chars: usize) -> String {
    let prefix: String = text.chars().take(prefix_chars).collect();
    prefix.to_lowercase().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_truncates_then_lowercases_and_trims() {
        assert_eq!(normalize("  Hello Nami  ", 50), "hello nami");
        let long = "x".repeat(80);
        assert_eq!(normalize(&long, 50).len(), 50);
        // Truncation happens before trimming.
        assert_eq!(normalize("   abc", 4), "a");
    }

    #[test]
    fn repeat_from_same_source_is_rejected() {
        let log = RecentResponseLog::default();
        assert!(log.is_empty());
        assert!(log.check_and_record(SourceKind::DirectMicrophone, "hello nami"));
        assert!(!log.check_and_record(SourceKind::DirectMicrophone, "HELLO NAMI "));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn same_text_from_other_source_is_allowed() {
        let log = RecentResponseLog::default();
        assert!(log.check_and_record(SourceKind::DirectMicrophone, "hello nami"));
        assert!(log.check_and_record(SourceKind::TwitchMention, "hello nami"));
    }

    #[test]
    fn texts_sharing_a_long_prefix_collide() {
        let log = RecentResponseLog::default();
        let stem = "a".repeat(50);
        assert!(log.check_and_record(SourceKind::TwitchMention, &format!("{stem} one")));
        assert!(!log.check_and_record(SourceKind::TwitchMention, &format!("{stem} two")));
    }

    #[test]
    fn oldest_record_is_evicted_past_capacity() {
        let log = RecentResponseLog::new(DedupConfig {
            capacity: 2,
            prefix_chars: 50,
        });
        log.check_and_record(SourceKind::DirectMicrophone, "one");
        log.check_and_record(SourceKind::DirectMicrophone, "two");
        log.check_and_record(SourceKind::DirectMicrophone, "three");
        assert_eq!(log.len(), 2);
        assert!(log.check_and_record(SourceKind::DirectMicrophone, "one"));
    }

    #[test]
    fn forgotten_record_can_be_answered_again() {
        let log = RecentResponseLog::default();
        assert!(log.check_and_record(SourceKind::TwitchMention, "nami what game"));
        assert!(!log.forget(SourceKind::DirectMicrophone, "nami what game"));
        assert!(log.forget(SourceKind::TwitchMention, "  Nami what game"));
        assert!(log.is_empty());
        assert!(log.check_and_record(SourceKind::TwitchMention, "nami what game"));
    }
}
