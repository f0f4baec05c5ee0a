//! Reply fan-out to the UI, chat and speech side channels.

use async_trait::async_trait;
use chrono::Utc;
use nami_config::FanoutConfig;
use nami_core::error::ProviderError;
use nami_core::event::{DomainEvent, EventBus};
use nami_core::input::SourceInfo;
use nami_core::sink::{ChatSink, Speaker, UiSink};
use nami_core::source::SourceKind;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::dedup::RecentResponseLog;
use crate::format::chat_reply;
use crate::funnel::ResponseHandler;
use crate::stats::{Counter, RouterStats};

const PREVIEW_CHARS: usize = 80;

pub(crate) fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Delivers every generated reply. Chat and speech run as detached tasks so
/// a slow side channel never holds up the next dispatch.
pub struct Fanout {
    ui: Arc<dyn UiSink>,
    chat: Option<Arc<dyn ChatSink>>,
    speaker: Option<Arc<dyn Speaker>>,
    speech_slots: Arc<Semaphore>,
    dedup: Option<Arc<RecentResponseLog>>,
    stats: Arc<RouterStats>,
    bus: Arc<EventBus>,
}

impl Fanout {
    pub fn new(
        config: FanoutConfig,
        ui: Arc<dyn UiSink>,
        stats: Arc<RouterStats>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            ui,
            chat: None,
            speaker: None,
            speech_slots: Arc::new(Semaphore::new(config.max_concurrent_speech.max(1))),
            dedup: None,
            stats,
            bus,
        }
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatSink>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_speaker(mut self, speaker: Arc<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    /// Release the dedup record of an input whose reply failed, so a retry
    /// is not suppressed.
    pub fn with_dedup(mut self, dedup: Arc<RecentResponseLog>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    fn send_chat(&self, text: String) {
        let Some(chat) = self.chat.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = chat.send_to_chat(&text).await {
                warn!(error = %e, "Chat delivery failed");
            }
        });
    }

    fn speak(&self, text: String) {
        let Some(speaker) = self.speaker.clone() else {
            return;
        };
        let Ok(permit) = self.speech_slots.clone().try_acquire_owned() else {
            debug!("Speech pool saturated, reply not spoken");
            self.stats.bump(Counter::SpeechShed);
            return;
        };
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = speaker.speak(&text).await {
                warn!(error = %e, "Speech failed");
            }
        });
    }
}

#[async_trait]
impl ResponseHandler for Fanout {
    async fn on_reply(&self, reply: &str, prompt: &str, info: &SourceInfo) {
        let source = info.source.map(|s| s.as_str()).unwrap_or("console");
        self.ui.emit(
            "bot_reply",
            json!({ "reply": reply, "prompt": prompt, "source": source }),
        );

        if matches!(
            info.source,
            Some(SourceKind::TwitchMention | SourceKind::TwitchChat)
        ) {
            self.send_chat(chat_reply(info.username.as_deref(), reply));
        }
        if info.use_tts {
            self.speak(reply.to_string());
        }

        self.bus.publish(DomainEvent::ReplyDelivered {
            source: info.source,
            reply_preview: preview(reply),
            timestamp: Utc::now(),
        });
        self.stats.bump(Counter::Reply);
    }

    fn on_failure(&self, error: &ProviderError, info: &SourceInfo) {
        if let (Some(dedup), Some(source), Some(text)) =
            (&self.dedup, info.source, info.trigger_text.as_deref())
        {
            dedup.forget(source, text);
        }
        self.stats.bump(Counter::Failure);
        self.bus.publish(DomainEvent::ReplyFailed {
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}
