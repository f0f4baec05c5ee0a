//! Admission queue: decides which inputs compete for a reply.
//!
//! `offer` is synchronous and never blocks on reply generation: it updates
//! context, scores the event, remembers it for continuity, and (for
//! actionable sources only) pushes it onto a max-heap. A single consumer
//! task pops the best event, compares its score to the threshold of the
//! current conversation state, and either hands it to the registered
//! [`AdmissionHandler`] or drops it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nami_config::{AdmissionConfig, RouterConfig, ThresholdConfig};
use nami_core::event::{DomainEvent, DropReason, EventBus};
use nami_core::input::InputEvent;
use nami_core::source::{ContextCategory, ConversationState};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::ContextAggregator;
use crate::scoring::Scorer;
use crate::stats::{Counter, RouterStats};

const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Receives events that met the admission threshold.
#[async_trait]
pub trait AdmissionHandler: Send + Sync {
    async fn on_admitted(&self, event: InputEvent) -> nami_core::Result<()>;
}

/// Outcome of [`AdmissionQueue::offer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offer {
    pub score: f64,
    pub queued: bool,
}

// ── Heap entry ──────────────────────────────────────────────────────────────

struct Entry {
    score: f64,
    seq: u64,
    event: InputEvent,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.score.to_bits() == other.score.to_bits()
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    /// Highest score first; among equal scores the earlier insert wins.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.score.partial_cmp(&other.score) {
            Some(Ordering::Equal) | None => other.seq.cmp(&self.seq),
            Some(ord) => ord,
        }
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

// ── Shared state ────────────────────────────────────────────────────────────

struct Shared {
    scorer: Scorer,
    context: Arc<ContextAggregator>,
    thresholds: ThresholdConfig,
    config: AdmissionConfig,
    state: RwLock<ConversationState>,
    queue: Mutex<QueueState>,
    recent: Mutex<VecDeque<InputEvent>>,
    last_response: Mutex<Option<DateTime<Utc>>>,
    handler: RwLock<Option<Arc<dyn AdmissionHandler>>>,
    stats: Arc<RouterStats>,
    bus: Arc<EventBus>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn current_state(&self) -> ConversationState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop(&self) -> Option<Entry> {
        lock(&self.queue).heap.pop()
    }

    async fn process(&self, entry: Entry) -> nami_core::Result<()> {
        let threshold = self.thresholds.for_state(self.current_state());
        let source = entry.event.source;

        if entry.score < threshold {
            debug!(%source, score = entry.score, threshold, "Below threshold, dropped");
            self.stats.bump(Counter::BelowThreshold);
            self.bus.publish(DomainEvent::EventDropped {
                source,
                score: entry.score,
                reason: DropReason::BelowThreshold,
                timestamp: Utc::now(),
            });
            return Ok(());
        }

        debug!(%source, score = entry.score, threshold, "Admitted");
        self.stats.bump(Counter::Admitted);
        self.bus.publish(DomainEvent::EventAdmitted {
            source,
            score: entry.score,
            threshold,
            timestamp: Utc::now(),
        });

        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(handler) = handler else {
            debug!("No admission handler registered");
            return Ok(());
        };

        // A panicking handler surfaces as a JoinError instead of killing
        // the consumer.
        let event = entry.event;
        tokio::spawn(async move { handler.on_admitted(event).await })
            .await
            .map_err(|e| nami_core::Error::Internal(format!("admission handler panicked: {e}")))??;

        *lock(&self.last_response) = Some(Utc::now());
        Ok(())
    }
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

// ── Queue ───────────────────────────────────────────────────────────────────

pub struct AdmissionQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl AdmissionQueue {
    pub fn new(
        config: &RouterConfig,
        context: Arc<ContextAggregator>,
        stats: Arc<RouterStats>,
        bus: Arc<EventBus>,
    ) -> Self {
        let shared = Shared {
            scorer: Scorer::new(config.source_weights, config.scoring),
            context,
            thresholds: config.thresholds,
            config: config.admission,
            state: RwLock::new(config.initial_state),
            queue: Mutex::new(QueueState::default()),
            recent: Mutex::new(VecDeque::with_capacity(config.admission.recent_events_capacity + 1)),
            last_response: Mutex::new(None),
            handler: RwLock::new(None),
            stats,
            bus,
        };
        Self {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
        }
    }

    pub fn set_handler(&self, handler: Arc<dyn AdmissionHandler>) {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn scorer(&self) -> &Scorer {
        &self.shared.scorer
    }

    /// Update context, score, and (for actionable sources) enqueue.
    pub fn offer(&self, event: InputEvent) -> Offer {
        let shared = &self.shared;
        let now = Utc::now();

        match event.source.context_category() {
            ContextCategory::Chat => shared
                .context
                .update_chat(&event.username_or("Someone"), &event.text),
            category => shared.context.update(category, &event.text),
        }

        let last_response = *lock(&shared.last_response);
        let event = {
            let mut recent = lock(&shared.recent);
            let score = shared
                .scorer
                .score_at(&event, recent.make_contiguous(), last_response, now);
            let event = event.with_score(score);
            recent.push_back(event.clone());
            while recent.len() > shared.config.recent_events_capacity {
                recent.pop_front();
            }
            event
        };

        let score = event.score().unwrap_or_default();
        let queued = event.source.is_actionable();

        if queued {
            let mut queue = lock(&shared.queue);
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.heap.push(Entry { score, seq, event });
            shared.stats.bump(Counter::Queued);
        } else {
            shared.stats.bump(Counter::ContextOnly);
        }

        Offer { score, queued }
    }

    /// Switch conversation state and return the new threshold.
    pub fn set_state(&self, state: ConversationState) -> f64 {
        *self
            .shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = state;
        let threshold = self.shared.thresholds.for_state(state);
        info!(%state, threshold, "Conversation state changed");
        threshold
    }

    pub fn state(&self) -> ConversationState {
        self.shared.current_state()
    }

    pub fn threshold(&self) -> f64 {
        self.shared.thresholds.for_state(self.state())
    }

    pub fn last_response(&self) -> Option<DateTime<Utc>> {
        *lock(&self.shared.last_response)
    }

    /// Number of events waiting for the consumer.
    pub fn len(&self) -> usize {
        lock(&self.shared.queue).heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Texts of the events kept for continuity scoring, oldest first.
    pub fn recent_texts(&self) -> Vec<String> {
        lock(&self.shared.recent)
            .iter()
            .map(|e| e.text.clone())
            .collect()
    }

    /// Drop every queued event without processing it.
    pub fn clear(&self) -> usize {
        let discarded = {
            let mut queue = lock(&self.shared.queue);
            let n = queue.heap.len();
            queue.heap.clear();
            n
        };
        info!(discarded, "Admission queue cleared");
        self.shared.bus.publish(DomainEvent::QueueCleared {
            discarded,
            timestamp: Utc::now(),
        });
        discarded
    }

    pub fn is_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Start the consumer task. Returns `false` when it was already running
    /// or no Tokio runtime is available.
    pub fn start(&self) -> bool {
        let mut worker = lock(&self.worker);
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return false;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(e) => {
                warn!(error = %e, "Cannot start admission consumer outside a runtime");
                return false;
            }
        };
        let (shutdown, rx) = watch::channel(false);
        let handle = runtime.spawn(consume(self.shared.clone(), rx));
        *worker = Some(Worker { shutdown, handle });
        true
    }

    /// Stop the consumer. An in-flight dispatch may finish; nothing new is
    /// popped afterwards. Safe to call repeatedly.
    pub async fn stop(&self) {
        let worker = lock(&self.worker).take();
        let Some(worker) = worker else {
            return;
        };
        let _ = worker.shutdown.send(true);
        if tokio::time::timeout(STOP_TIMEOUT, worker.handle).await.is_err() {
            warn!("Admission consumer did not stop in time");
        }
    }
}

async fn consume(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    info!("Admission consumer started");
    let idle = Duration::from_millis(shared.config.idle_poll_ms);
    let settle = Duration::from_millis(shared.config.settle_ms);
    let backoff = Duration::from_millis(shared.config.error_backoff_ms);

    loop {
        if *shutdown.borrow() {
            break;
        }
        let Some(entry) = shared.pop() else {
            if pause(&mut shutdown, idle).await {
                break;
            }
            continue;
        };
        let wait = match shared.process(entry).await {
            Ok(()) => settle,
            Err(e) => {
                warn!(error = %e, "Admission dispatch failed");
                backoff
            }
        };
        if pause(&mut shutdown, wait).await {
            break;
        }
    }
    info!("Admission consumer stopped");
}

/// Sleep for `duration`, waking early on shutdown. Returns true when the
/// consumer should exit.
async fn pause(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => *shutdown.borrow(),
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
