//! Prompt templates, one per source.

use nami_core::input::{InputEvent, MediaKind};
use nami_core::source::SourceKind;

const DEFAULT_USERNAME: &str = "Someone";

/// Build the prompt handed to the reply generator for `event`.
pub fn format_prompt(event: &InputEvent) -> String {
    let text = event.text.trim();
    match event.source {
        SourceKind::DirectMicrophone => format!("You said: {text}"),
        SourceKind::TwitchMention => {
            format!("{} in chat: {text}", event.username_or(DEFAULT_USERNAME))
        }
        SourceKind::AmbientAudio => match event.metadata.source_type {
            Some(MediaKind::Music) => format!(
                "You're hearing music: {text}. React to this if you find it interesting."
            ),
            Some(MediaKind::Speech) | None => format!(
                "You're overhearing: {text}. React to this if you find it interesting."
            ),
        },
        SourceKind::VisualChange => {
            let lead = if event.metadata.is_summary {
                "You're seeing"
            } else {
                "You notice"
            };
            format!("{lead}: {text}. React to what you're seeing if you find it interesting.")
        }
        SourceKind::TwitchChat => format!(
            "You see {} chatting: {text}. React to this if you find it interesting.",
            event.username_or(DEFAULT_USERNAME)
        ),
    }
}

/// Address a chat reply to the viewer who triggered it.
pub fn chat_reply(username: Option<&str>, reply: &str) -> String {
    match username.map(str::trim).filter(|u| !u.is_empty()) {
        Some(user) => format!("@{user} {reply}"),
        None => reply.to_string(),
    }
}
