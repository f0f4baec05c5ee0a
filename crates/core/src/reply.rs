//! Reply generation seam.
//!
//! The router never talks to a language model directly. It hands a finished
//! prompt to a `ReplyGenerator` and treats `None` (or an empty string) as
//! "nothing to say". Calls may block for seconds; the router guarantees it
//! never runs two of them concurrently.

use async_trait::async_trait;

use crate::error::ProviderError;

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce a reply for `prompt`, or `None` to stay silent.
    async fn generate_reply(&self, prompt: &str) -> Result<Option<String>, ProviderError>;
}

/// Something that can describe the bot's current surroundings in prose.
///
/// Implemented by the context aggregator and consumed by reply generators
/// that want to ground the model in what is happening right now.
pub trait ContextSource: Send + Sync {
    fn situation_summary(&self) -> String;
}
