//! Side-channel traits: where a finished reply goes.
//!
//! Every sink is best-effort. The router logs delivery failures and moves on;
//! a broken TTS engine or chat connection never stalls routing.

use async_trait::async_trait;

use crate::error::SinkError;

/// Posts a message to the live chat.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_to_chat(&self, text: &str) -> Result<(), SinkError>;
}

/// Speaks a reply aloud.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SinkError>;
}

/// Telemetry sink for dashboards and consoles.
///
/// Synchronous on purpose: emitting must be cheap enough to call while
/// routing.
pub trait UiSink: Send + Sync {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

/// A UI sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUi;

impl UiSink for NullUi {
    fn emit(&self, _event: &str, _payload: serde_json::Value) {}
}
