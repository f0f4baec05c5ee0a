//! Input events: the transient value objects that flow through the router.
//!
//! Producer → `InputEvent` → scorer → admission queue → funnel → reply.
//! An event is never persisted; it lives only while traversing the queues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::SourceKind;

/// What kind of audio an ambient clip was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    Speech,
    Music,
}

/// Producer-supplied hints attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Recognizer confidence in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Chat username (chat sources only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Stated relevance in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,

    /// Stated urgency in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<f64>,

    /// Speech/music classification for ambient audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<MediaKind>,

    /// Whether a visual event is a scene summary rather than a single change
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_summary: bool,

    /// Anything else the producer wants to carry along
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }

    pub fn with_urgency(mut self, urgency: f64) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn with_source_type(mut self, kind: MediaKind) -> Self {
        self.source_type = Some(kind);
        self
    }

    pub fn summary(mut self) -> Self {
        self.is_summary = true;
        self
    }
}

/// A single input observed by one of the producers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputEvent {
    pub source: SourceKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: EventMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

impl InputEvent {
    /// Create an unscored event stamped with the current time.
    pub fn new(source: SourceKind, text: impl Into<String>, metadata: EventMetadata) -> Self {
        Self::at(source, text, metadata, Utc::now())
    }

    /// Create an unscored event with an explicit timestamp.
    pub fn at(
        source: SourceKind,
        text: impl Into<String>,
        metadata: EventMetadata,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            text: text.into(),
            timestamp,
            metadata,
            score: None,
        }
    }

    /// Attach the score. Scoring happens exactly once, so an already-scored
    /// event keeps its original value.
    pub fn with_score(mut self, score: f64) -> Self {
        if self.score.is_none() {
            self.score = Some(score);
        }
        self
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// Username for chat sources, falling back to a neutral placeholder.
    pub fn username_or(&self, fallback: &str) -> String {
        self.metadata
            .username
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Routing information carried alongside a funnel prompt so the reply can
/// be fanned out to the right side channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Originating source; `None` for operator console input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Hand the reply to the TTS side channel
    #[serde(default)]
    pub use_tts: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// When the triggering event was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,

    /// Raw text of the triggering event, before prompt formatting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_text: Option<String>,
}

impl SourceInfo {
    /// Source info for a scored event. Only direct microphone speech is
    /// answered out loud.
    pub fn from_event(event: &InputEvent) -> Self {
        Self {
            source: Some(event.source),
            username: event.metadata.username.clone(),
            use_tts: event.source == SourceKind::DirectMicrophone,
            score: event.score(),
            observed_at: Some(event.timestamp),
            trigger_text: Some(event.text.clone()),
        }
    }

    /// Source info for text typed at the operator console.
    pub fn console() -> Self {
        Self::default()
    }
}
