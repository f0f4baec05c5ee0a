//! Dispatch funnel: the rate-limited, serial path to reply generation.
//!
//! Items are ordered by priority (lower first, FIFO among equals). One
//! consumer task at a time pulls an item, waits out the minimum interval
//! since the previous dispatch, calls the reply generator, and hands any
//! reply to the response handler. The consumer exits when the queue runs
//! dry and is respawned by the next `enqueue`.

use async_trait::async_trait;
use nami_core::error::ProviderError;
use nami_core::input::SourceInfo;
use nami_core::reply::ReplyGenerator;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Smallest allowed gap between two dispatches.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);
/// Longest single sleep while rate limiting, so shutdown stays responsive.
const WAIT_STEP: Duration = Duration::from_millis(100);
/// How long an idle consumer waits for new work before exiting.
const IDLE_WAIT: Duration = Duration::from_millis(500);
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-item callback run with the reply after the shared handler.
pub type OnResponse = Box<dyn FnOnce(String) + Send>;

/// Receives every reply the funnel produces.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn on_reply(&self, reply: &str, prompt: &str, info: &SourceInfo);

    /// Called when reply generation fails. The funnel moves on either way.
    fn on_failure(&self, _error: &ProviderError, _info: &SourceInfo) {}
}

pub struct FunnelItem {
    pub content: String,
    pub priority: f64,
    pub source_info: SourceInfo,
    pub on_response: Option<OnResponse>,
}

struct Entry {
    priority: f64,
    seq: u64,
    item: FunnelItem,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.priority.to_bits() == other.priority.to_bits()
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    /// Reversed so the max-heap yields the lowest priority number, then the
    /// earliest insert.
    fn cmp(&self, other: &Self) -> Ordering {
        match other.priority.partial_cmp(&self.priority) {
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
    consumer_active: bool,
}

struct Inner {
    generator: Arc<dyn ReplyGenerator>,
    handler: RwLock<Option<Arc<dyn ResponseHandler>>>,
    queue: Mutex<QueueState>,
    min_interval: Mutex<Duration>,
    last_dispatch: Mutex<Option<Instant>>,
    shutdown: AtomicBool,
    wake: Notify,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(AtomicOrdering::SeqCst)
    }

    fn handler(&self) -> Option<Arc<dyn ResponseHandler>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pop the next item, or mark the consumer inactive when there is none.
    /// Both happen under the queue lock so `enqueue` never misses a respawn.
    fn next_or_retire(&self) -> Option<FunnelItem> {
        let mut queue = lock(&self.queue);
        match queue.heap.pop() {
            Some(entry) => Some(entry.item),
            None => {
                queue.consumer_active = false;
                None
            }
        }
    }

    fn try_next(&self) -> Option<FunnelItem> {
        lock(&self.queue).heap.pop().map(|e| e.item)
    }

    /// Sleep until the minimum interval since the last dispatch has passed.
    /// Returns false if shutdown was requested meanwhile.
    async fn wait_for_slot(&self) -> bool {
        loop {
            if self.is_shutdown() {
                return false;
            }
            let interval = *lock(&self.min_interval);
            let remaining = match *lock(&self.last_dispatch) {
                Some(last) => interval.saturating_sub(last.elapsed()),
                None => Duration::ZERO,
            };
            if remaining.is_zero() {
                return true;
            }
            tokio::time::sleep(remaining.min(WAIT_STEP)).await;
        }
    }

    async fn dispatch(&self, item: FunnelItem) {
        *lock(&self.last_dispatch) = Some(Instant::now());
        debug!(priority = item.priority, prompt = %item.content, "Dispatching");

        match self.generator.generate_reply(&item.content).await {
            Ok(Some(reply)) if !reply.trim().is_empty() => {
                if self.is_shutdown() {
                    debug!("Reply arrived after shutdown, discarded");
                    return;
                }
                if let Some(handler) = self.handler() {
                    handler.on_reply(&reply, &item.content, &item.source_info).await;
                }
                if let Some(callback) = item.on_response {
                    callback(reply);
                }
            }
            Ok(_) => debug!("No reply generated"),
            Err(e) => {
                warn!(error = %e, "Reply generation failed");
                if let Some(handler) = self.handler() {
                    handler.on_failure(&e, &item.source_info);
                }
            }
        }
    }
}

/// Clears `consumer_active` if the consumer exits without retiring through
/// `next_or_retire`, so the next `enqueue` can spawn a fresh one.
struct ActiveGuard {
    inner: Arc<Inner>,
    armed: bool,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.armed {
            lock(&self.inner.queue).consumer_active = false;
        }
    }
}

async fn consume(inner: Arc<Inner>) {
    debug!("Funnel consumer started");
    let mut guard = ActiveGuard {
        inner: inner.clone(),
        armed: true,
    };
    loop {
        if inner.is_shutdown() {
            break;
        }
        let item = match inner.try_next() {
            Some(item) => item,
            None => {
                let _ = tokio::time::timeout(IDLE_WAIT, inner.wake.notified()).await;
                match inner.next_or_retire() {
                    Some(item) => item,
                    None => {
                        guard.armed = false;
                        debug!("Funnel drained, consumer exiting");
                        return;
                    }
                }
            }
        };
        if !inner.wait_for_slot().await {
            break;
        }

        // A panic in the generator or a reply handler surfaces as a
        // JoinError; the item is lost but the funnel keeps going.
        let task = inner.clone();
        if let Err(e) = tokio::spawn(async move { task.dispatch(item).await }).await {
            warn!(error = %e, "Dispatch panicked, moving to the next item");
        }
    }
    debug!("Funnel consumer stopped");
}

pub struct DispatchFunnel {
    inner: Arc<Inner>,
}

impl DispatchFunnel {
    pub fn new(generator: Arc<dyn ReplyGenerator>, min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                generator,
                handler: RwLock::new(None),
                queue: Mutex::new(QueueState::default()),
                min_interval: Mutex::new(min_interval.max(MIN_INTERVAL)),
                last_dispatch: Mutex::new(None),
                shutdown: AtomicBool::new(false),
                wake: Notify::new(),
                consumer: Mutex::new(None),
            }),
        }
    }

    pub fn set_response_handler(&self, handler: Arc<dyn ResponseHandler>) {
        *self
            .inner
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Queue `content` for dispatch. Never blocks.
    ///
    /// Returns `false` once the funnel has been stopped; the item is
    /// discarded.
    pub fn enqueue(
        &self,
        content: impl Into<String>,
        priority: f64,
        source_info: SourceInfo,
        on_response: Option<OnResponse>,
    ) -> bool {
        if self.inner.is_shutdown() {
            debug!("Funnel stopped, item discarded");
            return false;
        }
        let item = FunnelItem {
            content: content.into(),
            priority,
            source_info,
            on_response,
        };

        let spawn = {
            let mut queue = lock(&self.inner.queue);
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.heap.push(Entry { priority, seq, item });
            let spawn = !queue.consumer_active;
            queue.consumer_active = true;
            spawn
        };

        if spawn {
            self.spawn_consumer();
        } else {
            self.inner.wake.notify_one();
        }
        true
    }

    fn spawn_consumer(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let handle = rt.spawn(consume(self.inner.clone()));
                *lock(&self.inner.consumer) = Some(handle);
            }
            Err(e) => {
                // Leave the item queued; the next enqueue inside a runtime
                // retries the spawn.
                warn!(error = %e, "Cannot start funnel consumer outside a runtime");
                lock(&self.inner.queue).consumer_active = false;
            }
        }
    }

    pub fn min_interval(&self) -> Duration {
        *lock(&self.inner.min_interval)
    }

    /// Change the minimum gap between dispatches, clamped to 0.1 s.
    pub fn set_min_interval(&self, interval: Duration) -> Duration {
        let clamped = interval.max(MIN_INTERVAL);
        *lock(&self.inner.min_interval) = clamped;
        info!(interval_secs = clamped.as_secs_f64(), "Dispatch interval changed");
        clamped
    }

    /// Number of items waiting.
    pub fn pending(&self) -> usize {
        lock(&self.inner.queue).heap.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// Stop dispatching: wait up to two seconds for the consumer, then drop
    /// whatever is still queued. Returns the number of items discarded.
    /// Repeated calls are harmless.
    pub async fn stop(&self) -> usize {
        let first = !self.inner.shutdown.swap(true, AtomicOrdering::SeqCst);
        self.inner.wake.notify_waiters();

        let handle = lock(&self.inner.consumer).take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!("Funnel consumer did not stop in time");
            }
        }

        let discarded = {
            let mut queue = lock(&self.inner.queue);
            let n = queue.heap.len();
            queue.heap.clear();
            n
        };
        if first {
            info!(discarded, "Dispatch funnel stopped");
        }
        discarded
    }
}
