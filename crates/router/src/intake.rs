//! Intake line parsers for hearing, vision and chat producers.
//!
//! Producers print one observation per line. Each parser turns a line into
//! an [`IntakeAction`]: an event to ingest, a bare context update, or
//! nothing.

use nami_config::{AppConfig, ProducerKind};
use nami_core::input::{EventMetadata, MediaKind};
use nami_core::source::{ContextCategory, SourceKind};

const MIC_TAG: &str = "[Microphone Input]";
const CHAT_TAG: &str = "[CHAT]";
const VISION_TAG: &str = "[VISION]";
const SUMMARY_TAGS: [&str; 2] = ["[SUMMARY]", "[Summary]"];
const EYE_GLYPHS: [&str; 2] = ["\u{1F441}\u{FE0F}", "\u{1F441}"];
const VISION_NOISE: [&str; 4] = ["Error", "Exception", "WARNING", "[VISION ERROR]"];

const DEFAULT_CONFIDENCE: f64 = 0.7;
const MIN_TEXT_CHARS: usize = 2;

/// What to do with one producer line.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeAction {
    Ingest {
        source: SourceKind,
        text: String,
        metadata: EventMetadata,
    },
    Context {
        category: ContextCategory,
        text: String,
    },
    Ignore,
}

impl IntakeAction {
    fn ingest(source: SourceKind, text: &str, metadata: EventMetadata) -> Self {
        IntakeAction::Ingest {
            source,
            text: text.to_string(),
            metadata,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Intake {
    bot_name: String,
    aliases: Vec<String>,
}

impl Intake {
    pub fn new(bot_name: impl Into<String>, aliases: &[String]) -> Self {
        let bot_name = bot_name.into().trim().to_lowercase();
        let mut aliases: Vec<String> = aliases
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        if !bot_name.is_empty() && !aliases.contains(&bot_name) {
            aliases.push(bot_name.clone());
        }
        Self { bot_name, aliases }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.bot_name, &config.mention_aliases)
    }

    /// Case-insensitive substring match against the bot's name and aliases.
    pub fn mentions_bot(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.aliases.iter().any(|a| lower.contains(a.as_str()))
    }

    /// Parse a line from a producer of the given kind.
    pub fn parse(&self, kind: ProducerKind, line: &str) -> IntakeAction {
        match kind {
            ProducerKind::Hearing => self.parse_hearing(line),
            ProducerKind::Vision => self.parse_vision(line),
            ProducerKind::Chat => self.parse_chat(line),
        }
    }

    /// Parse a line only if it starts with a recognised producer tag.
    ///
    /// Used for console input, where untagged lines are operator text.
    pub fn parse_tagged(&self, line: &str) -> Option<IntakeAction> {
        let trimmed = line.trim_start();
        if trimmed.starts_with(MIC_TAG) || audio_tag(trimmed).is_some() {
            Some(self.parse_hearing(trimmed))
        } else if trimmed.starts_with(VISION_TAG)
            || SUMMARY_TAGS.iter().any(|t| trimmed.starts_with(t))
        {
            Some(self.parse_vision(trimmed))
        } else if trimmed.starts_with(CHAT_TAG) {
            Some(self.parse_chat(trimmed))
        } else {
            None
        }
    }

    pub fn parse_hearing(&self, line: &str) -> IntakeAction {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(MIC_TAG) {
            let text = rest.trim();
            if too_short(text) {
                return IntakeAction::Ignore;
            }
            if !self.mentions_bot(text) {
                return IntakeAction::Context {
                    category: ContextCategory::SpokenWord,
                    text: text.to_string(),
                };
            }
            let metadata = EventMetadata::new()
                .with_confidence(DEFAULT_CONFIDENCE)
                .with_relevance(DEFAULT_CONFIDENCE)
                .with_urgency(0.5);
            return IntakeAction::ingest(SourceKind::DirectMicrophone, text, metadata);
        }

        let Some((kind, confidence, text)) = audio_tag(line) else {
            return IntakeAction::Ignore;
        };
        if too_short(text) {
            return IntakeAction::Ignore;
        }
        let metadata = EventMetadata::new()
            .with_source_type(kind)
            .with_confidence(confidence)
            .with_relevance(confidence * 0.8)
            .with_urgency(0.2);
        IntakeAction::ingest(SourceKind::AmbientAudio, text, metadata)
    }

    pub fn parse_vision(&self, line: &str) -> IntakeAction {
        let line = line.trim();
        if line.is_empty() || VISION_NOISE.iter().any(|n| line.contains(n)) {
            return IntakeAction::Ignore;
        }

        let mut is_summary = false;
        let mut confidence = DEFAULT_CONFIDENCE;
        let text = if let Some(rest) = line.strip_prefix(VISION_TAG) {
            strip_eye(rest)
        } else if let Some(rest) = SUMMARY_TAGS.iter().find_map(|t| line.strip_prefix(t)) {
            is_summary = true;
            confidence = 0.9;
            rest.trim()
        } else if let Some((secs, rest)) = timed_analysis(line) {
            confidence = (1.0 - secs / 10.0).clamp(0.5, 0.95);
            rest
        } else {
            line
        };

        if too_short(text) || (!is_summary && confidence < 0.5) {
            return IntakeAction::Ignore;
        }

        let mut metadata = EventMetadata::new()
            .with_confidence(confidence)
            .with_relevance(confidence * if is_summary { 1.5 } else { 1.0 })
            .with_urgency(if is_summary { 0.3 } else { 0.2 });
        if is_summary {
            metadata = metadata.summary();
        }
        IntakeAction::ingest(SourceKind::VisualChange, text, metadata)
    }

    pub fn parse_chat(&self, line: &str) -> IntakeAction {
        let line = line.trim();
        let body = line.strip_prefix(CHAT_TAG).unwrap_or(line).trim();
        let Some((username, message)) = body.split_once(':') else {
            return IntakeAction::Ignore;
        };
        let (username, message) = (username.trim(), message.trim());
        if username.is_empty() || too_short(message) {
            return IntakeAction::Ignore;
        }
        if username.eq_ignore_ascii_case(&self.bot_name) {
            return IntakeAction::Ignore;
        }

        let source = if self.mentions_bot(message) {
            SourceKind::TwitchMention
        } else {
            SourceKind::TwitchChat
        };
        let metadata = EventMetadata::new()
            .with_username(username)
            .with_relevance(0.5);
        IntakeAction::ingest(source, message, metadata)
    }
}

fn too_short(text: &str) -> bool {
    text.chars().count() < MIN_TEXT_CHARS
}

fn strip_eye(text: &str) -> &str {
    let text = text.trim();
    EYE_GLYPHS
        .iter()
        .find_map(|g| text.strip_prefix(g))
        .unwrap_or(text)
        .trim()
}

/// `[SPEECH 0.82] text` or `[MUSIC 0.6] text`.
fn audio_tag(line: &str) -> Option<(MediaKind, f64, &str)> {
    let (kind, rest) = if let Some(rest) = line.strip_prefix("[SPEECH") {
        (MediaKind::Speech, rest)
    } else if let Some(rest) = line.strip_prefix("[MUSIC") {
        (MediaKind::Music, rest)
    } else {
        return None;
    };
    let (inside, text) = rest.split_once(']')?;
    let confidence = inside
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite())
        .map_or(DEFAULT_CONFIDENCE, |c| c.clamp(0.0, 1.0));
    Some((kind, confidence, text.trim()))
}

/// `1.42: a player opens a chest`, where the number is processing time.
fn timed_analysis(line: &str) -> Option<(f64, &str)> {
    let (head, rest) = line.split_once(':')?;
    let secs = head.trim().parse::<f64>().ok().filter(|s| s.is_finite())?;
    Some((secs, rest.trim()))
}
