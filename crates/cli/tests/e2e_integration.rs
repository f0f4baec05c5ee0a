//! End-to-end tests for the Nami attention router.
//!
//! These drive the full pipeline from producer input to side-channel
//! output: context, scoring, admission, deduplication, the dispatch funnel
//! and fan-out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nami_config::{AdmissionConfig, AppConfig, ContextConfig, ProducerKind, RouterConfig};
use nami_core::error::{ProviderError, SinkError};
use nami_core::event::DomainEvent;
use nami_core::input::{EventMetadata, InputEvent, SourceInfo};
use nami_core::reply::ReplyGenerator;
use nami_core::sink::{ChatSink, Speaker, UiSink};
use nami_core::source::{ContextCategory, ConversationState, SourceKind};
use nami_router::{ContextAggregator, DispatchFunnel, LineOutcome, Router, RouterBuilder, Scorer};
use tokio::time::Instant;

// ── Mock side channels ───────────────────────────────────────────────────

/// Records every prompt with the instant the call started.
#[derive(Default)]
struct RecordingGenerator {
    calls: Mutex<Vec<(String, Instant)>>,
}

impl RecordingGenerator {
    fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ReplyGenerator for RecordingGenerator {
    async fn generate_reply(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), Instant::now()));
        Ok(Some(format!("reply #{}", self.count())))
    }
}

#[derive(Default)]
struct RecordingChat {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatSink for RecordingChat {
    async fn send_to_chat(&self, text: &str) -> Result<(), SinkError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SinkError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A speaker whose device is gone.
struct BrokenSpeaker;

#[async_trait]
impl Speaker for BrokenSpeaker {
    async fn speak(&self, _text: &str) -> Result<(), SinkError> {
        Err(SinkError::DeliveryFailed {
            sink: "tts".into(),
            reason: "no audio device".into(),
        })
    }
}

#[derive(Default)]
struct RecordingUi {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingUi {
    fn named(&self, name: &str) -> Vec<serde_json::Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl UiSink for RecordingUi {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    router: Router,
    generator: Arc<RecordingGenerator>,
    chat: Arc<RecordingChat>,
    speaker: Arc<RecordingSpeaker>,
    ui: Arc<RecordingUi>,
}

fn fast_config() -> RouterConfig {
    RouterConfig {
        min_prompt_interval_secs: 0.1,
        admission: AdmissionConfig {
            idle_poll_ms: 10,
            settle_ms: 20,
            error_backoff_ms: 50,
            ..AdmissionConfig::default()
        },
        ..RouterConfig::default()
    }
}

fn harness(config: RouterConfig) -> Harness {
    let generator = Arc::new(RecordingGenerator::default());
    let chat = Arc::new(RecordingChat::default());
    let speaker = Arc::new(RecordingSpeaker::default());
    let ui = Arc::new(RecordingUi::default());
    let router = Router::builder(config, generator.clone())
        .with_chat_sink(chat.clone())
        .with_speaker(speaker.clone())
        .with_ui(ui.clone())
        .build();
    router.start();
    Harness {
        router,
        generator,
        chat,
        speaker,
        ui,
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

/// Wait until the admission consumer has popped `n` events.
async fn wait_for_decisions(router: &Router, n: u64) {
    wait_until(|| {
        let s = router.stats();
        s.admitted + s.below_threshold >= n
    })
    .await;
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_passive_chat_only_updates_context() {
    let h = harness(fast_config());

    let offer = h
        .router
        .try_ingest(SourceKind::TwitchChat, "hey everyone", EventMetadata::new())
        .unwrap();

    assert!(!offer.queued);
    assert_eq!(
        h.router.context().snapshot(ContextCategory::Chat),
        vec!["Someone: hey everyone"]
    );
    assert_eq!(h.router.status().admission_pending, 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.generator.count(), 0);
    h.router.stop().await;
}

#[tokio::test]
async fn scenario_b_direct_speech_is_answered() {
    let h = harness(fast_config());

    h.router.ingest(
        SourceKind::DirectMicrophone,
        "hello nami",
        EventMetadata::new().with_confidence(0.9),
    );

    wait_until(|| h.generator.count() == 1).await;
    assert_eq!(h.generator.prompts(), vec!["You said: hello nami"]);

    // Microphone replies are spoken, never posted to chat.
    wait_until(|| h.speaker.spoken.lock().unwrap().len() == 1).await;
    assert!(h.chat.sent.lock().unwrap().is_empty());
    let replies = h.ui.named("bot_reply");
    assert_eq!(replies[0]["prompt"], "You said: hello nami");
    assert_eq!(replies[0]["source"], "direct_microphone");
    h.router.stop().await;
}

#[tokio::test]
async fn scenario_c_repeat_within_a_second_is_deduplicated() {
    let h = harness(fast_config());
    let meta = EventMetadata::new().with_confidence(0.9);

    h.router
        .ingest(SourceKind::DirectMicrophone, "hello nami", meta.clone());
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.router.ingest(SourceKind::DirectMicrophone, "hello nami", meta);

    wait_for_decisions(&h.router, 2).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.generator.count(), 1);
    assert_eq!(h.router.stats().duplicates, 1);
    h.router.stop().await;
}

#[tokio::test]
async fn scenario_d_stale_speech_stays_below_busy_threshold() {
    let h = harness(fast_config());
    h.router.set_state(ConversationState::Busy);

    // 0.8 base + 0.2 x (1 - 20/30) recency = 0.867 < 0.9
    let stale = InputEvent::at(
        SourceKind::DirectMicrophone,
        "hello nami",
        EventMetadata::new().with_confidence(0.9),
        Utc::now() - chrono::Duration::seconds(20),
    );
    let offer = h.router.ingest_event(stale).unwrap();
    assert!(offer.queued);
    assert!(offer.score < 0.9);

    wait_for_decisions(&h.router, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.router.stats().below_threshold, 1);
    assert_eq!(h.generator.count(), 0);
    h.router.stop().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_e_funnel_spaces_back_to_back_mentions() {
    let generator = Arc::new(RecordingGenerator::default());
    let funnel = DispatchFunnel::new(generator.clone(), Duration::from_secs(2));
    let mention = |user: &str| SourceInfo {
        source: Some(SourceKind::TwitchMention),
        username: Some(user.to_string()),
        ..SourceInfo::default()
    };

    let t0 = Instant::now();
    funnel.enqueue("alice in chat: hi nami", 0.2, mention("alice"), None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    funnel.enqueue("bob in chat: nami hello", 0.2, mention("bob"), None);

    wait_until(|| generator.count() == 2).await;
    let calls = generator.calls.lock().unwrap().clone();
    assert!(calls[0].1 - t0 < Duration::from_millis(50));
    assert!(calls[1].1 - t0 >= Duration::from_secs(2));
    assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(2));
    funnel.stop().await;
}

// ── Properties ───────────────────────────────────────────────────────────

#[tokio::test]
async fn context_only_sources_touch_one_buffer_and_never_queue() {
    for source in [
        SourceKind::AmbientAudio,
        SourceKind::VisualChange,
        SourceKind::TwitchChat,
    ] {
        let h = harness(fast_config());
        let offer = h
            .router
            .try_ingest(source, "something happened", EventMetadata::new().with_urgency(1.0))
            .unwrap();
        assert!(!offer.queued, "{source} was queued");
        assert_eq!(h.router.status().admission_pending, 0);

        let touched: Vec<_> = ContextCategory::ALL
            .into_iter()
            .filter(|c| h.router.context().len(*c) > 0)
            .collect();
        assert_eq!(touched, vec![source.context_category()]);
        h.router.stop().await;
    }
}

#[tokio::test]
async fn same_text_from_different_sources_is_not_a_duplicate() {
    let h = harness(fast_config());
    h.router.ingest(
        SourceKind::DirectMicrophone,
        "hello nami",
        EventMetadata::new(),
    );
    h.router.ingest(
        SourceKind::TwitchMention,
        "hello nami",
        EventMetadata::new().with_username("viewer42"),
    );

    wait_until(|| h.generator.count() == 2).await;
    assert_eq!(h.router.stats().duplicates, 0);

    // The mention reply is addressed back to the viewer in chat.
    wait_until(|| h.chat.sent.lock().unwrap().len() == 1).await;
    assert!(h.chat.sent.lock().unwrap()[0].starts_with("@viewer42 reply #"));
    h.router.stop().await;
}

#[test]
fn context_buffers_respect_window_and_cap() {
    let context = ContextAggregator::new(ContextConfig::default());
    let now = Utc::now();
    context.update_at(
        ContextCategory::Vision,
        "old scene",
        now - chrono::Duration::seconds(40),
    );
    context.update_at(ContextCategory::Vision, "new scene", now);
    assert_eq!(context.snapshot_at(ContextCategory::Vision, now), vec!["new scene"]);

    for i in 0..30 {
        context.update_chat("viewer", &format!("message {i}"));
    }
    let chat = context.snapshot(ContextCategory::Chat);
    assert_eq!(chat.len(), 20);
    assert_eq!(chat[0], "viewer: message 10");
}

#[test]
fn cooldown_lowers_score_right_after_a_reply() {
    let config = RouterConfig::default();
    let scorer = Scorer::new(config.source_weights, config.scoring);
    let now = Utc::now();
    let event = InputEvent::at(
        SourceKind::TwitchMention,
        "what is that",
        EventMetadata::new(),
        now,
    );

    let soon = scorer.score_at(&event, &[], Some(now - chrono::Duration::seconds(2)), now);
    let later = scorer.score_at(&event, &[], Some(now - chrono::Duration::seconds(6)), now);
    assert!(soon < later);
    assert_eq!(later, scorer.score_at(&event, &[], None, now));
}

#[tokio::test]
async fn below_threshold_events_never_reach_the_generator() {
    let h = harness(fast_config());
    h.router.set_state(ConversationState::Busy);

    // Mention base 0.7 + 0.2 recency = 0.9 meets busy; the stale one does not.
    let stale = InputEvent::at(
        SourceKind::TwitchMention,
        "nami are you there",
        EventMetadata::new(),
        Utc::now() - chrono::Duration::seconds(25),
    );
    h.router.ingest_event(stale).unwrap();
    wait_for_decisions(&h.router, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.generator.count(), 0);
    assert!(h.chat.sent.lock().unwrap().is_empty());
    h.router.stop().await;
}

// ── Pipeline behaviour ───────────────────────────────────────────────────

#[tokio::test]
async fn producer_lines_flow_through_intake_to_replies() {
    let config = AppConfig {
        router: fast_config(),
        ..AppConfig::default()
    };
    let generator = Arc::new(RecordingGenerator::default());
    let chat = Arc::new(RecordingChat::default());
    let router = RouterBuilder::from_config(&config, generator.clone())
        .with_chat_sink(chat.clone())
        .build();
    router.start();

    assert!(matches!(
        router.handle_line(Some(ProducerKind::Vision), "[SUMMARY] a rainy city level"),
        LineOutcome::Ingested(offer) if !offer.queued
    ));
    assert_eq!(
        router.handle_line(Some(ProducerKind::Hearing), "[Microphone Input] this boss is hard"),
        LineOutcome::ContextUpdated(ContextCategory::SpokenWord)
    );
    assert!(matches!(
        router.handle_line(Some(ProducerKind::Chat), "[CHAT] viewer42: nami which level is this"),
        LineOutcome::Ingested(offer) if offer.queued
    ));

    wait_until(|| chat.sent.lock().unwrap().len() == 1).await;
    assert_eq!(
        generator.prompts(),
        vec!["viewer42 in chat: nami which level is this"]
    );
    assert!(chat.sent.lock().unwrap()[0].starts_with("@viewer42 "));

    let summary = router.context_summary();
    assert!(summary.contains("a rainy city level"));
    assert!(summary.contains("this boss is hard"));
    assert!(summary.contains("viewer42: nami which level is this"));
    router.stop().await;
}

#[tokio::test]
async fn bot_messages_in_chat_are_not_answered() {
    let config = AppConfig::default();
    let router = RouterBuilder::from_config(&config, Arc::new(RecordingGenerator::default())).build();
    assert_eq!(
        router.handle_line(Some(ProducerKind::Chat), "[CHAT] peepingnami: hi nami fans"),
        LineOutcome::Ignored
    );
    assert_eq!(router.stats().ingested, 0);
}

#[tokio::test]
async fn speech_failure_does_not_stall_routing() {
    let generator = Arc::new(RecordingGenerator::default());
    let router = Router::builder(fast_config(), generator.clone())
        .with_speaker(Arc::new(BrokenSpeaker))
        .build();
    router.start();

    router.ingest(SourceKind::DirectMicrophone, "nami first question", EventMetadata::new());
    wait_until(|| router.stats().replies == 1).await;
    router.ingest(SourceKind::DirectMicrophone, "nami second topic", EventMetadata::new());
    wait_until(|| router.stats().replies == 2).await;

    assert_eq!(generator.count(), 2);
    router.stop().await;
}

#[tokio::test]
async fn domain_events_trace_an_input_end_to_end() {
    let h = harness(fast_config());
    let mut rx = h.router.event_bus().subscribe();

    h.router.ingest(SourceKind::DirectMicrophone, "hello nami", EventMetadata::new());
    wait_until(|| h.router.stats().replies == 1).await;

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(match event.as_ref() {
            DomainEvent::EventIngested { .. } => "ingested",
            DomainEvent::EventAdmitted { .. } => "admitted",
            DomainEvent::ReplyDelivered { .. } => "delivered",
            _ => "other",
        });
    }
    // The consumer may admit before the ingest notice goes out.
    assert_eq!(seen.len(), 3);
    assert!(seen.contains(&"ingested"));
    assert!(seen.contains(&"admitted"));
    assert_eq!(seen.last(), Some(&"delivered"));
    h.router.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_tolerates_late_input() {
    let h = harness(fast_config());
    h.router.stop().await;
    h.router.stop().await;

    // Producers may keep calling after shutdown; nothing is dispatched.
    let offer = h
        .router
        .try_ingest(SourceKind::DirectMicrophone, "nami still there?", EventMetadata::new())
        .unwrap();
    assert!(offer.queued);
    assert!(!h.router.submit_console("anyone?"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.generator.count(), 0);
}

#[tokio::test]
async fn operator_console_controls_the_router() {
    let h = harness(fast_config());

    assert!(matches!(
        h.router.handle_line(None, "/state engaged"),
        LineOutcome::Command(_)
    ));
    assert_eq!(h.router.state(), ConversationState::Engaged);
    assert_eq!(h.ui.named("state_changed")[0]["state"], "engaged");

    h.router.handle_line(None, "/disable chat");
    assert!(matches!(
        h.router.handle_line(None, "[CHAT] bob: gg"),
        LineOutcome::Rejected(_)
    ));

    assert!(matches!(
        h.router.handle_line(None, "/interval 3"),
        LineOutcome::Command(msg) if msg.contains("3.0s")
    ));
    assert!(matches!(
        h.router.handle_line(None, "/status"),
        LineOutcome::Command(msg) if msg.contains("twitch_chat")
    ));

    assert!(matches!(h.router.handle_line(None, "what's up"), LineOutcome::Console(true)));
    wait_until(|| h.generator.count() == 1).await;
    assert_eq!(h.generator.prompts(), vec!["Console input: what's up"]);
    assert!(h.speaker.spoken.lock().unwrap().is_empty());

    assert_eq!(h.router.handle_line(None, "quit"), LineOutcome::Exit);
    h.router.stop().await;
}
