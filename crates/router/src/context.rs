//! Rolling situation context.
//!
//! Vision, spoken-word, and ambient-audio buffers keep whatever arrived in
//! the last window; chat keeps the last N messages. All four live behind a
//! single lock so a render never sees a buffer halfway through a trim.

use chrono::{DateTime, Duration, Utc};
use nami_config::ContextConfig;
use nami_core::reply::ContextSource;
use nami_core::source::ContextCategory;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct Entry {
    at: DateTime<Utc>,
    text: String,
}

#[derive(Debug, Default)]
struct Buffers {
    vision: VecDeque<Entry>,
    spoken_word: VecDeque<Entry>,
    ambient_audio: VecDeque<Entry>,
    chat: VecDeque<Entry>,
}

impl Buffers {
    fn buffer_mut(&mut self, category: ContextCategory) -> &mut VecDeque<Entry> {
        match category {
            ContextCategory::Vision => &mut self.vision,
            ContextCategory::SpokenWord => &mut self.spoken_word,
            ContextCategory::AmbientAudio => &mut self.ambient_audio,
            ContextCategory::Chat => &mut self.chat,
        }
    }

    fn buffer(&self, category: ContextCategory) -> &VecDeque<Entry> {
        match category {
            ContextCategory::Vision => &self.vision,
            ContextCategory::SpokenWord => &self.spoken_word,
            ContextCategory::AmbientAudio => &self.ambient_audio,
            ContextCategory::Chat => &self.chat,
        }
    }
}

pub struct ContextAggregator {
    config: ContextConfig,
    buffers: Mutex<Buffers>,
}

impl ContextAggregator {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            buffers: Mutex::new(Buffers::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time window of a category; `None` for chat, which is count-bounded.
    pub fn window(&self, category: ContextCategory) -> Option<Duration> {
        let secs = match category {
            ContextCategory::Vision => self.config.vision_window_secs,
            ContextCategory::SpokenWord => self.config.spoken_word_window_secs,
            ContextCategory::AmbientAudio => self.config.ambient_audio_window_secs,
            ContextCategory::Chat => return None,
        };
        Some(Duration::milliseconds((secs * 1000.0) as i64))
    }

    pub fn update(&self, category: ContextCategory, text: &str) {
        self.update_at(category, text, Utc::now());
    }

    /// Append `text` to a buffer and trim it. Blank text is ignored.
    pub fn update_at(&self, category: ContextCategory, text: &str, now: DateTime<Utc>) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let mut buffers = self.lock();
        buffers.buffer_mut(category).push_back(Entry {
            at: now,
            text: text.to_string(),
        });
        self.trim(&mut buffers, category, now);
    }

    /// Append a chat line as `username: message`.
    pub fn update_chat(&self, username: &str, message: &str) {
        if message.trim().is_empty() {
            return;
        }
        self.update(ContextCategory::Chat, &format!("{username}: {}", message.trim()));
    }

    fn trim(&self, buffers: &mut Buffers, category: ContextCategory, now: DateTime<Utc>) {
        let buffer = buffers.buffer_mut(category);
        match self.window(category) {
            Some(window) => {
                while buffer.front().is_some_and(|e| now - e.at > window) {
                    buffer.pop_front();
                }
            }
            None => {
                while buffer.len() > self.config.chat_capacity {
                    buffer.pop_front();
                }
            }
        }
    }

    /// Texts currently held for a category, oldest first, after expiring
    /// anything outside the window.
    pub fn snapshot(&self, category: ContextCategory) -> Vec<String> {
        self.snapshot_at(category, Utc::now())
    }

    pub fn snapshot_at(&self, category: ContextCategory, now: DateTime<Utc>) -> Vec<String> {
        let mut buffers = self.lock();
        self.trim(&mut buffers, category, now);
        buffers
            .buffer(category)
            .iter()
            .map(|e| e.text.clone())
            .collect()
    }

    pub fn len(&self, category: ContextCategory) -> usize {
        self.lock().buffer(category).len()
    }

    pub fn is_empty(&self) -> bool {
        let buffers = self.lock();
        ContextCategory::ALL
            .iter()
            .all(|c| buffers.buffer(*c).is_empty())
    }

    pub fn clear(&self) {
        *self.lock() = Buffers::default();
    }

    pub fn render_summary(&self) -> String {
        self.render_summary_at(Utc::now())
    }

    /// Render every buffer under its heading, with a fixed sentence in
    /// place of an empty one.
    pub fn render_summary_at(&self, now: DateTime<Utc>) -> String {
        let mut buffers = self.lock();
        let mut sections = Vec::with_capacity(ContextCategory::ALL.len());
        for category in ContextCategory::ALL {
            self.trim(&mut buffers, category, now);
            let title = match self.window(category) {
                Some(window) => format!("{} (last {}s):", heading(category), window.num_seconds()),
                None => format!("{}:", heading(category)),
            };
            let buffer = buffers.buffer(category);
            let body = if buffer.is_empty() {
                placeholder(category).to_string()
            } else {
                buffer
                    .iter()
                    .map(|e| e.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            sections.push(format!("{title}\n{body}"));
        }
        sections.join("\n\n")
    }
}

fn heading(category: ContextCategory) -> &'static str {
    match category {
        ContextCategory::Vision => "What you've seen",
        ContextCategory::SpokenWord => "What you've heard spoken",
        ContextCategory::AmbientAudio => "What you've heard",
        ContextCategory::Chat => "Recent chat",
    }
}

fn placeholder(category: ContextCategory) -> &'static str {
    match category {
        ContextCategory::Vision => "You haven't seen anything recently.",
        ContextCategory::SpokenWord => "You haven't heard anyone speak recently.",
        ContextCategory::AmbientAudio => "You haven't heard anything recently.",
        ContextCategory::Chat => "Chat has been quiet.",
    }
}

impl ContextSource for ContextAggregator {
    fn situation_summary(&self) -> String {
        self.render_summary()
    }
}

impl Default for ContextAggregator {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn empty_summary_uses_placeholders() {
        let ctx = ContextAggregator::default();
        let summary = ctx.render_summary();
        assert!(summary.contains("What you've seen (last 30s):\nYou haven't seen anything recently."));
        assert!(summary.contains("You haven't heard anyone speak recently."));
        assert!(summary.contains("You haven't heard anything recently."));
        assert!(summary.contains("Recent chat:\nChat has been quiet."));
    }

    #[test]
    fn blank_text_is_a_noop() {
        let ctx = ContextAggregator::default();
        ctx.update(ContextCategory::Vision, "   ");
        ctx.update_chat("bob", "");
        assert!(ctx.is_empty());
    }

    #[test]
    fn entries_expire_outside_the_window() {
        let ctx = ContextAggregator::default();
        let t0 = Utc::now();
        ctx.update_at(ContextCategory::Vision, "a red car", t0);
        ctx.update_at(ContextCategory::Vision, "a blue car", t0 + secs(20));
        // Inserting at t0+31 expires the first entry but not the second.
        ctx.update_at(ContextCategory::Vision, "a green car", t0 + secs(31));
        assert_eq!(
            ctx.snapshot_at(ContextCategory::Vision, t0 + secs(31)),
            vec!["a blue car", "a green car"]
        );
    }

    #[test]
    fn render_prunes_stale_entries() {
        let ctx = ContextAggregator::default();
        let t0 = Utc::now();
        ctx.update_at(ContextCategory::AmbientAudio, "guitar riff", t0);
        let later = ctx.render_summary_at(t0 + secs(45));
        assert!(!later.contains("guitar riff"));
        assert!(later.contains("You haven't heard anything recently."));
        assert_eq!(ctx.len(ContextCategory::AmbientAudio), 0);
    }

    #[test]
    fn chat_is_bounded_by_count_not_age() {
        let config = ContextConfig {
            chat_capacity: 3,
            ..ContextConfig::default()
        };
        let ctx = ContextAggregator::new(config);
        for i in 0..5 {
            ctx.update_chat(&format!("user{i}"), "hi");
        }
        assert_eq!(
            ctx.snapshot(ContextCategory::Chat),
            vec!["user2: hi", "user3: hi", "user4: hi"]
        );
    }

    #[test]
    fn summary_lists_each_section_in_order() {
        let ctx = ContextAggregator::default();
        ctx.update(ContextCategory::Vision, "a boss fight");
        ctx.update(ContextCategory::SpokenWord, "let's go");
        ctx.update(ContextCategory::AmbientAudio, "epic music");
        ctx.update_chat("bob", "pog");

        let summary = ctx.situation_summary();
        let seen = summary.find("a boss fight").unwrap();
        let spoken = summary.find("let's go").unwrap();
        let heard = summary.find("epic music").unwrap();
        let chat = summary.find("bob: pog").unwrap();
        assert!(seen < spoken && spoken < heard && heard < chat);
    }

    #[test]
    fn categories_do_not_share_buffers() {
        let ctx = ContextAggregator::default();
        ctx.update(ContextCategory::SpokenWord, "hello");
        assert_eq!(ctx.len(ContextCategory::SpokenWord), 1);
        assert_eq!(ctx.len(ContextCategory::Vision), 0);
        assert_eq!(ctx.len(ContextCategory::Chat), 0);
    }
}
