//! LLM provider implementations for Nami.
//!
//! All providers implement the `nami_core::Provider` trait. The
//! `ConversationResponder` wraps one and implements `ReplyGenerator`.

pub mod openai_compat;
pub mod responder;

pub use openai_compat::OpenAiCompatProvider;
pub use responder::ConversationResponder;

use nami_core::reply::ContextSource;
use std::sync::Arc;

/// Build the model client described by the configuration.
///
/// A base URL on the default Ollama port gets the `ollama` provider name,
/// anything else is treated as a generic OpenAI-compatible endpoint.
pub fn provider_from_config(config: &nami_config::ProviderConfig) -> OpenAiCompatProvider {
    if config.base_url.contains(":11434") {
        OpenAiCompatProvider::ollama(Some(&config.base_url))
    } else {
        OpenAiCompatProvider::new(
            "openai-compat",
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
        )
    }
}

/// Build the reply generator described by the configuration.
pub fn build_from_config(
    config: &nami_config::AppConfig,
    context: Option<Arc<dyn ContextSource>>,
) -> ConversationResponder {
    let provider_config = &config.provider;
    let provider = provider_from_config(provider_config);

    let responder = ConversationResponder::new(Arc::new(provider), &provider_config.model)
        .with_history_len(provider_config.history_len)
        .with_temperature(provider_config.temperature)
        .with_max_tokens(provider_config.max_tokens)
        .with_system_prompt(provider_config.system_prompt.clone())
        .with_banned_words(provider_config.banned_words.clone());

    match context {
        Some(context) => responder.with_context(context),
        None => responder,
    }
}
