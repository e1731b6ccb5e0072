//! In-process bus with per-subscription dispatcher threads.

use crate::error::{MonitorError, Result};
use crate::logging::current_dispatch;
use crate::subject;
use crate::types::BusMessage;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{dispatcher, Dispatch};

use super::{Bus, BusSubscription, MessageHandler, PendingLimits};

/// Internal subscription state, shared by the bus, the handle and the
/// dispatcher thread.
struct Subscription {
    id: u64,
    pattern: String,
    active: AtomicBool,
    /// Queued plus currently executing.
    pending_messages: AtomicUsize,
    pending_bytes: AtomicUsize,
    max_messages: AtomicUsize,
    max_bytes: AtomicUsize,
    dropped: AtomicU64,
    sender: Mutex<Option<Sender<BusMessage>>>,
}

impl Subscription {
    fn limits(&self) -> PendingLimits {
        PendingLimits::new(
            self.max_messages.load(Ordering::Relaxed),
            self.max_bytes.load(Ordering::Relaxed),
        )
    }

    /// Queue a message for the dispatcher. Returns false if it was dropped.
    fn offer(&self, message: BusMessage) -> bool {
        let size = message.size();
        let messages = self.pending_messages.fetch_add(1, Ordering::AcqRel) + 1;
        let bytes = self.pending_bytes.fetch_add(size, Ordering::AcqRel) + size;

        if self.limits().exceeded_by(messages, bytes) {
            self.release(size);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let sender = self.sender.lock();
        let sent = match sender.as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        };
        if !sent {
            self.release(size);
        }
        sent
    }

    fn release(&self, size: usize) {
        self.pending_messages.fetch_sub(1, Ordering::AcqRel);
        self.pending_bytes.fetch_sub(size, Ordering::AcqRel);
    }

    /// Deactivate and disconnect the dispatcher. Returns false if already done.
    fn shut(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.sender.lock().take();
        true
    }

    fn is_idle(&self) -> bool {
        self.pending_messages.load(Ordering::Acquire) == 0
    }
}

struct BusInner {
    subscriptions: RwLock<HashMap<u64, Arc<Subscription>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    default_limits: PendingLimits,
    dispatch: Dispatch,
}

impl BusInner {
    fn remove(&self, id: u64) {
        self.subscriptions.write().remove(&id);
    }
}

/// A bus living entirely inside this process.
///
/// Each subscription gets its own dispatcher thread, so handlers for
/// different subscriptions run in parallel while deliveries to a single
/// subscription keep publish order. Publishing never blocks: a subscriber
/// over its pending limits loses the message.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<BusInner>,
}

impl LocalBus {
    /// Create a bus using default pending limits and the caller's logger.
    pub fn new() -> Self {
        Self::with_limits(PendingLimits::default())
    }

    /// Create a bus whose new subscriptions start with `limits`.
    pub fn with_limits(limits: PendingLimits) -> Self {
        Self::with_dispatch(limits, current_dispatch())
    }

    /// Create a bus logging through `dispatch`.
    pub fn with_dispatch(limits: PendingLimits, dispatch: Dispatch) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscriptions: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                default_limits: limits,
                dispatch,
            }),
        }
    }

    /// Publish a payload with no headers.
    pub fn publish(&self, subject: &str, payload: impl Into<Vec<u8>>) -> Result<usize> {
        self.publish_message(BusMessage::new(subject, payload))
    }

    /// Publish a message to every matching subscription.
    ///
    /// Returns how many subscriptions accepted it.
    pub fn publish_message(&self, message: BusMessage) -> Result<usize> {
        if self.is_closed() {
            return Err(MonitorError::BusClosed);
        }
        subject::validate_subject(&message.subject)?;

        let targets: Vec<Arc<Subscription>> = {
            let subs = self.inner.subscriptions.read();
            subs.values()
                .filter(|sub| subject::matches(&sub.pattern, &message.subject))
                .cloned()
                .collect()
        };

        let mut accepted = 0;
        for sub in targets {
            if sub.offer(message.clone()) {
                accepted += 1;
            } else if sub.active.load(Ordering::Acquire) {
                dispatcher::with_default(&self.inner.dispatch, || {
                    tracing::warn!(
                        subject = %message.subject,
                        pattern = %sub.pattern,
                        dropped = sub.dropped.load(Ordering::Relaxed),
                        "Slow consumer, message dropped"
                    );
                });
            }
        }

        Ok(accepted)
    }

    /// Tear down every subscription and refuse new ones.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let subs: Vec<Arc<Subscription>> = self
            .inner
            .subscriptions
            .write()
            .drain()
            .map(|(_, sub)| sub)
            .collect();
        for sub in subs {
            sub.shut();
        }
        dispatcher::with_default(&self.inner.dispatch, || {
            tracing::debug!("Local bus closed");
        });
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().len()
    }

    /// Patterns of the active subscriptions, sorted.
    pub fn active_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self
            .inner
            .subscriptions
            .read()
            .values()
            .map(|sub| sub.pattern.clone())
            .collect();
        patterns.sort();
        patterns
    }

    /// Wait until every queued message has been handled.
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let idle = self
                .inner
                .subscriptions
                .read()
                .values()
                .all(|sub| sub.is_idle());
            if idle {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn spawn_dispatcher(
        sub: Arc<Subscription>,
        receiver: Receiver<BusMessage>,
        handler: MessageHandler,
    ) -> std::io::Result<()> {
        thread::Builder::new()
            .name(format!("bus-sub-{}", sub.id))
            .spawn(move || {
                for message in receiver.iter() {
                    let size = message.size();
                    if sub.active.load(Ordering::Acquire) {
                        handler(message);
                    }
                    sub.release(size);
                }
            })
            .map(|_| ())
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for LocalBus {
    fn subscribe(
        &self,
        pattern: &str,
        handler: MessageHandler,
    ) -> Result<Box<dyn BusSubscription>> {
        if self.is_closed() {
            return Err(MonitorError::BusClosed);
        }
        subject::validate_pattern(pattern)?;

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = unbounded();
        let limits = self.inner.default_limits;

        let sub = Arc::new(Subscription {
            id,
            pattern: pattern.to_string(),
            active: AtomicBool::new(true),
            pending_messages: AtomicUsize::new(0),
            pending_bytes: AtomicUsize::new(0),
            max_messages: AtomicUsize::new(limits.messages),
            max_bytes: AtomicUsize::new(limits.bytes),
            dropped: AtomicU64::new(0),
            sender: Mutex::new(Some(sender)),
        });

        Self::spawn_dispatcher(Arc::clone(&sub), receiver, handler).map_err(|e| {
            MonitorError::Subscribe {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        {
            let mut subs = self.inner.subscriptions.write();
            // close() may have run while the dispatcher was spawning
            if self.is_closed() {
                sub.shut();
                return Err(MonitorError::BusClosed);
            }
            subs.insert(id, Arc::clone(&sub));
        }

        Ok(Box::new(LocalSubscription {
            sub,
            bus: Arc::downgrade(&self.inner),
        }))
    }
}

/// Handle returned by [`LocalBus`]. Unsubscribes when dropped.
struct LocalSubscription {
    sub: Arc<Subscription>,
    bus: Weak<BusInner>,
}

impl BusSubscription for LocalSubscription {
    fn pattern(&self) -> &str {
        &self.sub.pattern
    }

    fn unsubscribe(&self) {
        if self.sub.shut() {
            if let Some(bus) = self.bus.upgrade() {
                bus.remove(self.sub.id);
            }
        }
    }

    fn set_pending_limits(&self, limits: PendingLimits) {
        self.sub.max_messages.store(limits.messages, Ordering::Relaxed);
        self.sub.max_bytes.store(limits.bytes, Ordering::Relaxed);
    }

    fn is_active(&self) -> bool {
        self.sub.active.load(Ordering::Acquire)
    }

    fn dropped(&self) -> u64 {
        self.sub.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for LocalSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
