//! The `Router` composition root.
//!
//! Owns every buffer, queue and lock of the attention pipeline. Producers
//! call [`Router::ingest`]; admitted events are deduplicated, formatted and
//! either handed to the dispatch funnel or answered inline; replies fan out
//! to the side channels.

use async_trait::async_trait;
use chrono::Utc;
use nami_config::{AppConfig, ProducerKind, RouterConfig};
use nami_core::error::IngestError;
use nami_core::event::{DomainEvent, EventBus};
use nami_core::input::{EventMetadata, InputEvent, SourceInfo};
use nami_core::reply::ReplyGenerator;
use nami_core::sink::{ChatSink, NullUi, Speaker, UiSink};
use nami_core::source::{ContextCategory, ConversationState, SourceKind};
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::admission::{AdmissionHandler, AdmissionQueue, Offer};
use crate::console::{HELP, OperatorCommand};
use crate::context::ContextAggregator;
use crate::dedup::RecentResponseLog;
use crate::fanout::{Fanout, preview};
use crate::format::format_prompt;
use crate::funnel::{DispatchFunnel, ResponseHandler};
use crate::intake::{Intake, IntakeAction};
use crate::stats::{Counter, RouterStats, StatsSnapshot};

/// Priority of operator console text in the funnel. Nothing outranks it.
const CONSOLE_PRIORITY: f64 = 0.0;

// ── Dispatcher ──────────────────────────────────────────────────────────────

/// Turns an admitted event into a reply request.
struct Dispatcher {
    dedup: Arc<RecentResponseLog>,
    funnel: Option<Arc<DispatchFunnel>>,
    generator: Arc<dyn ReplyGenerator>,
    fanout: Arc<Fanout>,
    stats: Arc<RouterStats>,
    bus: Arc<EventBus>,
}

#[async_trait]
impl AdmissionHandler for Dispatcher {
    async fn on_admitted(&self, event: InputEvent) -> nami_core::Result<()> {
        if !self.dedup.check_and_record(event.source, &event.text) {
            debug!(source = %event.source, "Repeat of a recent reply, skipped");
            self.stats.bump(Counter::Duplicate);
            self.bus.publish(DomainEvent::DuplicateSuppressed {
                source: event.source,
                text_preview: preview(&event.text),
                timestamp: Utc::now(),
            });
            return Ok(());
        }

        let prompt = format_prompt(&event);
        let info = SourceInfo::from_event(&event);

        if let Some(funnel) = &self.funnel {
            let priority = 1.0 - event.score().unwrap_or_default();
            if funnel.enqueue(prompt, priority, info, None) {
                self.stats.bump(Counter::Funneled);
            }
            return Ok(());
        }

        match self.generator.generate_reply(&prompt).await {
            Ok(Some(reply)) if !reply.trim().is_empty() => {
                self.fanout.on_reply(&reply, &prompt, &info).await;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => {
                self.fanout.on_failure(&e, &info);
                Err(e.into())
            }
        }
    }
}

// ── Outcomes ────────────────────────────────────────────────────────────────

/// What [`Router::handle_line`] did with a line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Ingested(Offer),
    ContextUpdated(ContextCategory),
    /// Operator text sent for a reply; `false` if it was discarded
    Console(bool),
    /// Operator command executed; the text is feedback for the console
    Command(String),
    Rejected(IngestError),
    Ignored,
    Exit,
}

/// Point-in-time view of the router for `/status`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterStatus {
    pub state: ConversationState,
    pub threshold: f64,
    pub running: bool,
    pub admission_pending: usize,
    pub funnel_pending: Option<usize>,
    pub dispatch_interval: Option<Duration>,
    pub disabled: Vec<SourceKind>,
    pub stats: StatsSnapshot,
}

impl fmt::Display for RouterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State:      {} (threshold {:.2})", self.state, self.threshold)?;
        writeln!(
            f,
            "Consumer:   {}",
            if self.running { "running" } else { "stopped" }
        )?;
        writeln!(f, "Admission:  {} waiting", self.admission_pending)?;
        match (self.funnel_pending, self.dispatch_interval) {
            (Some(pending), Some(interval)) => writeln!(
                f,
                "Funnel:     {pending} waiting, {:.1}s between replies",
                interval.as_secs_f64()
            )?,
            _ => writeln!(f, "Funnel:     off (inline replies)")?,
        }
        let disabled = if self.disabled.is_empty() {
            "none".to_string()
        } else {
            self.disabled
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f, "Disabled:   {disabled}")?;
        let s = &self.stats;
        write!(
            f,
            "Counters:   ingested {} | rejected {} | context-only {} | queued {} | admitted {} | \
             below-threshold {} | duplicates {} | replies {} | failures {}",
            s.ingested,
            s.rejected,
            s.context_only,
            s.queued,
            s.admitted,
            s.below_threshold,
            s.duplicates,
            s.replies,
            s.failures
        )
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

pub struct RouterBuilder {
    config: RouterConfig,
    generator: Arc<dyn ReplyGenerator>,
    intake: Intake,
    context: Option<Arc<ContextAggregator>>,
    chat: Option<Arc<dyn ChatSink>>,
    speaker: Option<Arc<dyn Speaker>>,
    ui: Arc<dyn UiSink>,
    bus: Option<Arc<EventBus>>,
}

impl RouterBuilder {
    pub fn new(config: RouterConfig, generator: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            config,
            generator,
            intake: Intake::new("peepingnami", &["nami".to_string()]),
            context: None,
            chat: None,
            speaker: None,
            ui: Arc::new(NullUi),
            bus: None,
        }
    }

    /// Router settings and mention names from a full application config.
    pub fn from_config(config: &AppConfig, generator: Arc<dyn ReplyGenerator>) -> Self {
        Self::new(config.router.clone(), generator).with_intake(Intake::from_config(config))
    }

    pub fn with_intake(mut self, intake: Intake) -> Self {
        self.intake = intake;
        self
    }

    /// Share an aggregator created up front, e.g. one the reply generator
    /// also reads from.
    pub fn with_context(mut self, context: Arc<ContextAggregator>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_chat_sink(mut self, chat: Arc<dyn ChatSink>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_speaker(mut self, speaker: Arc<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_ui(mut self, ui: Arc<dyn UiSink>) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Router {
        let config = self.config;
        let stats = Arc::new(RouterStats::new());
        let bus = self.bus.unwrap_or_default();
        let context = self
            .context
            .unwrap_or_else(|| Arc::new(ContextAggregator::new(config.context)));

        let dedup = Arc::new(RecentResponseLog::new(config.dedup));
        let mut fanout = Fanout::new(config.fanout, self.ui.clone(), stats.clone(), bus.clone())
            .with_dedup(dedup.clone());
        if let Some(chat) = self.chat {
            fanout = fanout.with_chat(chat);
        }
        if let Some(speaker) = self.speaker {
            fanout = fanout.with_speaker(speaker);
        }
        let fanout = Arc::new(fanout);

        let funnel = config.use_funnel.then(|| {
            let funnel = DispatchFunnel::new(self.generator.clone(), config.min_prompt_interval());
            funnel.set_response_handler(fanout.clone());
            Arc::new(funnel)
        });

        let admission = AdmissionQueue::new(&config, context.clone(), stats.clone(), bus.clone());
        admission.set_handler(Arc::new(Dispatcher {
            dedup: dedup.clone(),
            funnel: funnel.clone(),
            generator: self.generator,
            fanout,
            stats: stats.clone(),
            bus: bus.clone(),
        }));

        let disabled = config.disabled_sources.iter().copied().collect();
        Router {
            context,
            admission,
            funnel,
            dedup,
            intake: self.intake,
            disabled: RwLock::new(disabled),
            ui: self.ui,
            stats,
            bus,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

pub struct Router {
    context: Arc<ContextAggregator>,
    admission: AdmissionQueue,
    funnel: Option<Arc<DispatchFunnel>>,
    dedup: Arc<RecentResponseLog>,
    intake: Intake,
    disabled: RwLock<BTreeSet<SourceKind>>,
    ui: Arc<dyn UiSink>,
    stats: Arc<RouterStats>,
    bus: Arc<EventBus>,
}

impl Router {
    pub fn builder(config: RouterConfig, generator: Arc<dyn ReplyGenerator>) -> RouterBuilder {
        RouterBuilder::new(config, generator)
    }

    // ── Inbound ─────────────────────────────────────────────────────────────

    /// Ingest one producer observation, reporting why it was refused.
    pub fn try_ingest(
        &self,
        source: SourceKind,
        text: &str,
        metadata: EventMetadata,
    ) -> Result<Offer, IngestError> {
        self.ingest_event(InputEvent::new(source, text.trim(), metadata))
    }

    /// Ingest an event that carries its producer's own timestamp.
    pub fn ingest_event(&self, mut event: InputEvent) -> Result<Offer, IngestError> {
        let source = event.source;
        let trimmed = event.text.trim();
        if trimmed.is_empty() {
            self.stats.bump(Counter::Rejected);
            return Err(IngestError::EmptyText);
        }
        if trimmed.len() != event.text.len() {
            event.text = trimmed.to_string();
        }
        if !self.is_enabled(source) {
            self.stats.bump(Counter::Rejected);
            return Err(IngestError::SourceDisabled(source.to_string()));
        }

        if source.is_chat() {
            self.ui.emit(
                "twitch_message",
                json!({
                    "username": event.metadata.username.as_deref().unwrap_or("Someone"),
                    "message": &event.text,
                }),
            );
        }

        let offer = self.admission.offer(event);
        self.stats.bump(Counter::Ingested);
        self.bus.publish(DomainEvent::EventIngested {
            source,
            score: offer.score,
            queued: offer.queued,
            timestamp: Utc::now(),
        });
        debug!(%source, score = offer.score, queued = offer.queued, "Ingested");
        Ok(offer)
    }

    /// Fire-and-forget ingest. A refused input is logged once and dropped.
    pub fn ingest(&self, source: SourceKind, text: &str, metadata: EventMetadata) -> Option<Offer> {
        match self.try_ingest(source, text, metadata) {
            Ok(offer) => Some(offer),
            Err(e) => {
                debug!(%source, reason = %e, "Input dropped");
                None
            }
        }
    }

    /// Ingest by source name, as external producers and scripts report it.
    pub fn ingest_named(
        &self,
        source: &str,
        text: &str,
        metadata: EventMetadata,
    ) -> Result<Offer, IngestError> {
        let source: SourceKind = source.parse().inspect_err(|_| {
            self.stats.bump(Counter::Rejected);
        })?;
        self.try_ingest(source, text, metadata)
    }

    /// Send operator text for a reply, bypassing scoring.
    ///
    /// With a funnel the text jumps the queue without speech; otherwise it
    /// is ingested as high-relevance microphone input.
    pub fn submit_console(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        match &self.funnel {
            Some(funnel) => funnel.enqueue(
                format!("Console input: {text}"),
                CONSOLE_PRIORITY,
                SourceInfo::console(),
                None,
            ),
            None => {
                let metadata = EventMetadata::new()
                    .with_confidence(1.0)
                    .with_relevance(0.9)
                    .with_urgency(0.6);
                self.ingest(SourceKind::DirectMicrophone, text, metadata)
                    .is_some()
            }
        }
    }

    /// Route one line of input. `kind` is `None` for the operator console.
    pub fn handle_line(&self, kind: Option<ProducerKind>, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Ignored;
        }

        let action = match kind {
            Some(kind) => self.intake.parse(kind, line),
            None => {
                if let Some(command) = OperatorCommand::parse(line) {
                    return match command {
                        Ok(OperatorCommand::Exit) => LineOutcome::Exit,
                        Ok(command) => LineOutcome::Command(self.apply(command)),
                        Err(e) => LineOutcome::Rejected(e),
                    };
                }
                match self.intake.parse_tagged(line) {
                    Some(action) => action,
                    None => return LineOutcome::Console(self.submit_console(line)),
                }
            }
        };

        match action {
            IntakeAction::Ingest {
                source,
                text,
                metadata,
            } => match self.try_ingest(source, &text, metadata) {
                Ok(offer) => LineOutcome::Ingested(offer),
                Err(e) => LineOutcome::Rejected(e),
            },
            IntakeAction::Context { category, text } => {
                self.context.update(category, &text);
                LineOutcome::ContextUpdated(category)
            }
            IntakeAction::Ignore => LineOutcome::Ignored,
        }
    }

    // ── Operator surface ────────────────────────────────────────────────────

    /// Execute a console command and describe the result.
    pub fn apply(&self, command: OperatorCommand) -> String {
        match command {
            OperatorCommand::SetState(state) => {
                let threshold = self.set_state(state);
                format!("State set to {state} (threshold {threshold:.2})")
            }
            OperatorCommand::Clear => {
                let discarded = self.clear_queue();
                format!("Cleared {discarded} queued input(s)")
            }
            OperatorCommand::Interval(secs) => {
                match self.set_dispatch_interval(Duration::from_secs_f64(secs)) {
                    Some(applied) => {
                        format!("Dispatch interval set to {:.1}s", applied.as_secs_f64())
                    }
                    None => "Funnel is off; replies are not rate limited".to_string(),
                }
            }
            OperatorCommand::Enable(source) => {
                self.enable(source);
                format!("Enabled {source}")
            }
            OperatorCommand::Disable(source) => {
                self.disable(source);
                format!("Disabled {source}")
            }
            OperatorCommand::Status => self.status().to_string(),
            OperatorCommand::Context => self.context_summary(),
            OperatorCommand::Help => HELP.to_string(),
            OperatorCommand::Exit => "Shutting down".to_string(),
        }
    }

    /// Switch state by name (`idle`, `engaged`, `observing`, `busy`).
    pub fn set_conversation_state(&self, name: &str) -> Result<f64, IngestError> {
        let state: ConversationState = name.parse()?;
        Ok(self.set_state(state))
    }

    /// Switch state and return the new admission threshold.
    pub fn set_state(&self, state: ConversationState) -> f64 {
        let threshold = self.admission.set_state(state);
        self.ui.emit(
            "state_changed",
            json!({ "state": state.as_str(), "threshold": threshold }),
        );
        self.bus.publish(DomainEvent::StateChanged {
            state,
            threshold,
            timestamp: Utc::now(),
        });
        threshold
    }

    pub fn state(&self) -> ConversationState {
        self.admission.state()
    }

    /// Drop everything waiting for admission.
    pub fn clear_queue(&self) -> usize {
        self.admission.clear()
    }

    /// Change the funnel's minimum interval. `None` when running without a
    /// funnel.
    pub fn set_dispatch_interval(&self, interval: Duration) -> Option<Duration> {
        self.funnel.as_ref().map(|f| f.set_min_interval(interval))
    }

    pub fn enable(&self, source: SourceKind) -> bool {
        let changed = self
            .disabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&source);
        if changed {
            info!(%source, "Source enabled");
        }
        changed
    }

    pub fn disable(&self, source: SourceKind) -> bool {
        let changed = self
            .disabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source);
        if changed {
            info!(%source, "Source disabled");
        }
        changed
    }

    pub fn is_enabled(&self, source: SourceKind) -> bool {
        !self
            .disabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&source)
    }

    pub fn status(&self) -> RouterStatus {
        RouterStatus {
            state: self.admission.state(),
            threshold: self.admission.threshold(),
            running: self.admission.is_running(),
            admission_pending: self.admission.len(),
            funnel_pending: self.funnel.as_ref().map(|f| f.pending()),
            dispatch_interval: self.funnel.as_ref().map(|f| f.min_interval()),
            disabled: self
                .disabled
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .copied()
                .collect(),
            stats: self.stats.snapshot(),
        }
    }

    pub fn context_summary(&self) -> String {
        self.context.render_summary()
    }

    pub fn context(&self) -> &Arc<ContextAggregator> {
        &self.context
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Responses remembered for deduplication.
    pub fn recent_responses(&self) -> usize {
        self.dedup.len()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    pub fn start(&self) -> bool {
        let started = self.admission.start();
        if started {
            info!(
                state = %self.admission.state(),
                funnel = self.funnel.is_some(),
                "Router started"
            );
        }
        started
    }

    /// Stop both consumers. In-flight replies may finish; nothing new
    /// starts. Safe to call more than once.
    pub async fn stop(&self) {
        self.admission.stop().await;
        if let Some(funnel) = &self.funnel {
            let discarded = funnel.stop().await;
            if discarded > 0 {
                warn!(discarded, "Pending replies dropped at shutdown");
            }
        }
        info!("Router stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nami_config::AdmissionConfig;
    use nami_core::error::ProviderError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplyGenerator for RecordingGenerator {
        async fn generate_reply(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(Some("okay!".into()))
        }
    }

    #[derive(Default)]
    struct RecordingUi {
        events: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl UiSink for RecordingUi {
        fn emit(&self, event: &str, payload: serde_json::Value) {
            self.events.lock().unwrap().push((event.to_string(), payload));
        }
    }

    fn fast_config(use_funnel: bool) -> RouterConfig {
        RouterConfig {
            use_funnel,
            min_prompt_interval_secs: 0.1,
            admission: AdmissionConfig {
                idle_poll_ms: 10,
                settle_ms: 10,
                error_backoff_ms: 50,
                ..AdmissionConfig::default()
            },
            ..RouterConfig::default()
        }
    }

    fn router(use_funnel: bool) -> (Router, Arc<RecordingGenerator>, Arc<RecordingUi>) {
        let generator = Arc::new(RecordingGenerator::default());
        let ui = Arc::new(RecordingUi::default());
        let router = Router::builder(fast_config(use_funnel), generator.clone())
            .with_ui(ui.clone())
            .build();
        (router, generator, ui)
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..300 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    /// Fails the first call, then answers.
    #[derive(Default)]
    struct FlakyGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplyGenerator for FlakyGenerator {
        async fn generate_reply(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            if prompts.len() == 1 {
                return Err(ProviderError::Network("down".into()));
            }
            Ok(Some("back online".into()))
        }
    }

    #[tokio::test]
    async fn failed_reply_does_not_block_a_retry() {
        for use_funnel in [true, false] {
            let generator = Arc::new(FlakyGenerator::default());
            let router = Router::builder(fast_config(use_funnel), generator.clone()).build();
            router.start();

            let meta = || EventMetadata::new().with_relevance(0.8);
            router.ingest(SourceKind::DirectMicrophone, "nami are you there", meta());
            wait_until(|| router.stats().failures == 1).await;
            assert_eq!(router.recent_responses(), 0, "funnel: {use_funnel}");

            router.ingest(SourceKind::DirectMicrophone, "nami are you there", meta());
            wait_until(|| router.stats().replies == 1).await;
            assert_eq!(generator.prompts.lock().unwrap().len(), 2);
            assert_eq!(router.stats().duplicates, 0);
            router.stop().await;
        }
    }

    #[test]
    fn blank_text_is_rejected_and_counted() {
        let (router, _, _) = router(true);
        assert_eq!(
            router.try_ingest(SourceKind::DirectMicrophone, "   ", EventMetadata::new()),
            Err(IngestError::EmptyText)
        );
        assert!(router.ingest(SourceKind::TwitchChat, "", EventMetadata::new()).is_none());
        assert_eq!(router.stats().rejected, 2);
        assert_eq!(router.stats().ingested, 0);
    }

    #[test]
    fn unknown_source_name_is_rejected() {
        let (router, _, _) = router(true);
        assert!(matches!(
            router.ingest_named("radio", "hello", EventMetadata::new()),
            Err(IngestError::UnknownSource(_))
        ));
        assert!(router
            .ingest_named("mic", "hello", EventMetadata::new())
            .is_ok_and(|o| o.queued));
    }

    #[test]
    fn disabled_source_drops_input_entirely() {
        let (router, _, _) = router(true);
        assert!(router.disable(SourceKind::VisualChange));
        assert!(!router.disable(SourceKind::VisualChange));
        assert!(matches!(
            router.try_ingest(SourceKind::VisualChange, "a cave", EventMetadata::new()),
            Err(IngestError::SourceDisabled(_))
        ));
        assert_eq!(router.context().len(ContextCategory::Vision), 0);

        assert!(router.enable(SourceKind::VisualChange));
        assert!(router
            .try_ingest(SourceKind::VisualChange, "a cave", EventMetadata::new())
            .is_ok());
        assert_eq!(router.context().len(ContextCategory::Vision), 1);
    }

    #[test]
    fn chat_ingest_emits_ui_message() {
        let (router, _, ui) = router(true);
        router.ingest(
            SourceKind::TwitchChat,
            "gg",
            EventMetadata::new().with_username("bob"),
        );
        let events = ui.events.lock().unwrap();
        assert_eq!(events[0].0, "twitch_message");
        assert_eq!(events[0].1["username"], "bob");
        assert_eq!(events[0].1["message"], "gg");
    }

    #[test]
    fn state_change_emits_ui_and_bus_events() {
        let (router, _, ui) = router(true);
        let mut rx = router.event_bus().subscribe();
        assert_eq!(router.set_conversation_state("observing"), Ok(0.8));
        assert!(router.set_conversation_state("asleep").is_err());
        assert_eq!(router.state(), ConversationState::Observing);

        assert_eq!(ui.events.lock().unwrap()[0].1["state"], "observing");
        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::StateChanged {
                state: ConversationState::Observing,
                ..
            }
        ));
    }

    #[test]
    fn console_lines_route_by_content() {
        let (router, _, _) = router(false);
        assert_eq!(router.handle_line(None, "exit"), LineOutcome::Exit);
        assert!(matches!(
            router.handle_line(None, "/state busy"),
            LineOutcome::Command(msg) if msg.contains("busy")
        ));
        assert!(matches!(
            router.handle_line(None, "/state nope"),
            LineOutcome::Rejected(IngestError::UnknownState(_))
        ));
        assert!(matches!(
            router.handle_line(None, "[CHAT] bob: hi all"),
            LineOutcome::Ingested(Offer { queued: false, .. })
        ));
        assert!(matches!(
            router.handle_line(None, "hey there"),
            LineOutcome::Console(true)
        ));
        assert_eq!(router.handle_line(None, "  "), LineOutcome::Ignored);
    }

    #[test]
    fn producer_lines_use_their_parser() {
        let (router, _, _) = router(true);
        assert_eq!(
            router.handle_line(Some(ProducerKind::Hearing), "[Microphone Input] nice jump"),
            LineOutcome::ContextUpdated(ContextCategory::SpokenWord)
        );
        assert_eq!(router.context().snapshot(ContextCategory::SpokenWord), vec!["nice jump"]);
        assert!(matches!(
            router.handle_line(Some(ProducerKind::Hearing), "[Microphone Input] nami hi"),
            LineOutcome::Ingested(Offer { queued: true, .. })
        ));
        assert_eq!(
            router.handle_line(Some(ProducerKind::Hearing), "model loaded"),
            LineOutcome::Ignored
        );
    }

    #[test]
    fn interval_command_without_funnel() {
        let (router, _, _) = router(false);
        assert_eq!(router.set_dispatch_interval(Duration::from_secs(3)), None);
        assert!(router.status().to_string().contains("off"));
    }

    #[tokio::test]
    async fn console_text_jumps_the_funnel() {
        let (router, generator, ui) = router(true);
        assert!(router.submit_console("what do you think?"));
        wait_until(|| generator.prompts.lock().unwrap().len() == 1).await;
        assert_eq!(
            generator.prompts.lock().unwrap()[0],
            "Console input: what do you think?"
        );
        wait_until(|| !ui.events.lock().unwrap().is_empty()).await;
        assert_eq!(ui.events.lock().unwrap()[0].1["source"], "console");
        router.stop().await;
    }

    #[tokio::test]
    async fn inline_mode_answers_without_funnel() {
        let (router, generator, ui) = router(false);
        router.start();
        router.ingest(
            SourceKind::DirectMicrophone,
            "hello nami",
            EventMetadata::new().with_confidence(0.9),
        );
        wait_until(|| router.stats().replies == 1).await;
        assert_eq!(generator.prompts.lock().unwrap().as_slice(), ["You said: hello nami"]);
        assert_eq!(ui.events.lock().unwrap()[0].0, "bot_reply");
        assert_eq!(router.recent_responses(), 1);
        router.stop().await;
        router.stop().await;
    }

    #[tokio::test]
    async fn status_reflects_queue_and_counters() {
        let (router, _, _) = router(true);
        router.ingest(SourceKind::TwitchMention, "nami hello", EventMetadata::new());
        router.ingest(SourceKind::AmbientAudio, "a song", EventMetadata::new());
        let status = router.status();
        assert!(!status.running);
        assert_eq!(status.admission_pending, 1);
        assert_eq!(status.funnel_pending, Some(0));
        assert_eq!(status.stats.context_only, 1);
        let text = status.to_string();
        assert!(text.contains("idle"));
        assert!(text.contains("ingested 2"));
    }
}
