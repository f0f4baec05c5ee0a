//! Conversation responder: turns a prompt into a reply.
//!
//! Keeps a short rolling history with the model, grounds each request in
//! the current situation summary, and masks banned words in the reply.

use async_trait::async_trait;
use nami_core::error::ProviderError;
use nami_core::message::{Conversation, Message};
use nami_core::provider::{Provider, ProviderRequest};
use nami_core::reply::{ContextSource, ReplyGenerator};
use regex_lite::Regex;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const FILTERED: &str = "*filtered*";

pub struct ConversationResponder {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    context: Option<Arc<dyn ContextSource>>,
    banned_words: Vec<Regex>,
    history: Mutex<Conversation>,
}

impl ConversationResponder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            system_prompt: None,
            context: None,
            banned_words: Vec::new(),
            history: Mutex::new(Conversation::default()),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_context(mut self, context: Arc<dyn ContextSource>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_history_len(self, len: usize) -> Self {
        Self {
            history: Mutex::new(Conversation::with_capacity(len)),
            ..self
        }
    }

    pub fn with_banned_words(mut self, words: Vec<String>) -> Self {
        self.banned_words = words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .filter_map(|w| match Regex::new(&format!("(?i){}", regex_lite::escape(w))) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(word = %w, error = %e, "Skipping unusable banned word");
                    None
                }
            })
            .collect();
        self
    }

    /// Number of messages currently remembered.
    pub fn history_len(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or(0)
    }

    fn system_message(&self) -> Option<Message> {
        let summary = self.context.as_ref().map(|c| c.situation_summary());
        let parts: Vec<&str> = [self.system_prompt.as_deref(), summary.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(Message::system(parts.join("\n\n")))
        }
    }

    /// Replace every case-insensitive occurrence of a banned word.
    fn censor(&self, text: &str) -> String {
        let mut out = text.to_string();
        for word in &self.banned_words {
            out = word.replace_all(&out, FILTERED).into_owned();
        }
        out
    }
}

#[async_trait]
impl ReplyGenerator for ConversationResponder {
    async fn generate_reply(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        let messages = {
            let mut history = self
                .history
                .lock()
                .map_err(|_| ProviderError::NotConfigured("conversation history poisoned".into()))?;
            history.push(Message::user(prompt));
            let mut messages: Vec<Message> = self.system_message().into_iter().collect();
            messages.extend(history.messages().cloned());
            messages
        };

        debug!(model = %self.model, messages = messages.len(), "Requesting reply");

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let result = self.provider.complete(request).await;

        let mut history = self
            .history
            .lock()
            .map_err(|_| ProviderError::NotConfigured("conversation history poisoned".into()))?;
        match result {
            Ok(response) => {
                let reply = self.censor(response.message.content.trim());
                if reply.is_empty() {
                    history.pop_last();
                    return Ok(None);
                }
                history.push(Message::assistant(reply.clone()));
                Ok(Some(reply))
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Reply generation failed");
                history.pop_last();
                Err(e)
            }
        }
    }
}
