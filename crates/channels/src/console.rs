//! Console side channels: print replies and chat relays to the terminal.
//!
//! Used by `nami run` when no dashboard or chat client is attached.

use async_trait::async_trait;
use nami_core::error::SinkError;
use nami_core::sink::{ChatSink, UiSink};
use tracing::debug;

/// Prints bot replies to stdout; every other UI event goes to the log.
#[derive(Debug, Default, Clone)]
pub struct ConsoleUi;

impl ConsoleUi {
    pub fn new() -> Self {
        Self
    }

    /// The line printed for a UI event, if it is one the console shows.
    pub fn render(event: &str, payload: &serde_json::Value) -> Option<String> {
        match event {
            "bot_reply" => payload["reply"].as_str().map(|reply| format!("[BOT] {reply}")),
            "state_changed" => payload["state"]
                .as_str()
                .map(|state| format!("[STATE] {state}")),
            _ => None,
        }
    }
}

impl UiSink for ConsoleUi {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        match Self::render(event, &payload) {
            Some(line) => println!("{line}"),
            None => debug!(event, %payload, "UI event"),
        }
    }
}

/// Stands in for the chat client: prints what would be posted.
#[derive(Debug, Clone)]
pub struct ConsoleChat {
    bot_name: String,
}

impl ConsoleChat {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
        }
    }
}

#[async_trait]
impl ChatSink for ConsoleChat {
    async fn send_to_chat(&self, text: &str) -> Result<(), SinkError> {
        println!("[CHAT] {}: {text}", self.bot_name);
        Ok(())
    }
}
