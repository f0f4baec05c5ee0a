//! Input sources, context categories, and conversation states.
//!
//! Every producer hands the router a `SourceKind`. The kind alone decides
//! which context buffer an event lands in and whether it may compete for a
//! reply slot, so both mappings are exhaustive matches here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IngestError;

/// Where an input event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Speech picked up by the streamer's microphone and addressed to the bot
    DirectMicrophone,
    /// A chat message that mentions the bot
    TwitchMention,
    /// Desktop audio (speech or music) overheard by the bot
    AmbientAudio,
    /// A change in what the bot can see on screen
    VisualChange,
    /// Regular chat traffic not addressed to the bot
    TwitchChat,
}

impl SourceKind {
    /// Every source kind, in descending order of prior importance.
    pub const ALL: [SourceKind; 5] = [
        SourceKind::DirectMicrophone,
        SourceKind::TwitchMention,
        SourceKind::VisualChange,
        SourceKind::AmbientAudio,
        SourceKind::TwitchChat,
    ];

    /// Stable snake_case name used in config files and console commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::DirectMicrophone => "direct_microphone",
            SourceKind::TwitchMention => "twitch_mention",
            SourceKind::AmbientAudio => "ambient_audio",
            SourceKind::VisualChange => "visual_change",
            SourceKind::TwitchChat => "twitch_chat",
        }
    }

    /// Whether events from this source compete for a reply.
    ///
    /// All other sources only feed ambient context.
    pub fn is_actionable(&self) -> bool {
        match self {
            SourceKind::DirectMicrophone | SourceKind::TwitchMention => true,
            SourceKind::AmbientAudio | SourceKind::VisualChange | SourceKind::TwitchChat => false,
        }
    }

    /// The single context buffer this source feeds.
    pub fn context_category(&self) -> ContextCategory {
        match self {
            SourceKind::DirectMicrophone => ContextCategory::SpokenWord,
            SourceKind::AmbientAudio => ContextCategory::AmbientAudio,
            SourceKind::VisualChange => ContextCategory::Vision,
            SourceKind::TwitchChat | SourceKind::TwitchMention => ContextCategory::Chat,
        }
    }

    /// Whether replies to this source should be relayed back to chat.
    pub fn is_chat(&self) -> bool {
        self.context_category() == ContextCategory::Chat
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = IngestError;

    /// Accepts `direct_microphone`, `DIRECT_MICROPHONE`, `direct-microphone`,
    /// and the short aliases `mic`, `mention`, `audio`, `vision`, `chat`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "direct_microphone" | "microphone" | "mic" => Ok(SourceKind::DirectMicrophone),
            "twitch_mention" | "mention" => Ok(SourceKind::TwitchMention),
            "ambient_audio" | "audio" | "desktop_audio" => Ok(SourceKind::AmbientAudio),
            "visual_change" | "vision" => Ok(SourceKind::VisualChange),
            "twitch_chat" | "chat" => Ok(SourceKind::TwitchChat),
            _ => Err(IngestError::UnknownSource(s.trim().to_string())),
        }
    }
}

/// The rolling context buffers maintained by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextCategory {
    Vision,
    SpokenWord,
    AmbientAudio,
    Chat,
}

impl ContextCategory {
    pub const ALL: [ContextCategory; 4] = [
        ContextCategory::Vision,
        ContextCategory::SpokenWord,
        ContextCategory::AmbientAudio,
        ContextCategory::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextCategory::Vision => "vision",
            ContextCategory::SpokenWord => "spoken_word",
            ContextCategory::AmbientAudio => "ambient_audio",
            ContextCategory::Chat => "chat",
        }
    }
}

impl fmt::Display for ContextCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide conversation mode. Each state maps to an admission threshold
/// that rises monotonically from `Idle` to `Busy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Engaged,
    Observing,
    Busy,
}

impl ConversationState {
    pub const ALL: [ConversationState; 4] = [
        ConversationState::Idle,
        ConversationState::Engaged,
        ConversationState::Observing,
        ConversationState::Busy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Engaged => "engaged",
            ConversationState::Observing => "observing",
            ConversationState::Busy => "busy",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationState {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(ConversationState::Idle),
            "engaged" => Ok(ConversationState::Engaged),
            "observing" => Ok(ConversationState::Observing),
            "busy" => Ok(ConversationState::Busy),
            _ => Err(IngestError::UnknownState(s.trim().to_string())),
        }
    }
}
