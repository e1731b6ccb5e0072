//! Wildcard subscription feeding the subject registry.

use crate::bus::{Bus, BusSubscription, MessageHandler, PendingLimits};
use crate::error::{MonitorError, Result};
use crate::logging::current_dispatch;
use crate::registry::SubjectRegistry;
use crate::subject::ALL_SUBJECTS;
use crate::types::{BusMessage, SubjectStat};
use crossbeam_channel::{bounded, select, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{dispatcher, Dispatch};

use super::CancelToken;

/// A running discovery subscription.
struct Active {
    subscription: Box<dyn BusSubscription>,
    generation: u64,
    /// Dropping this releases the cancellation watcher.
    _release: Sender<()>,
}

struct Shared {
    active: Mutex<Option<Active>>,
    next_generation: AtomicU64,
    dispatch: Dispatch,
}

impl Shared {
    /// Tear down the subscription if `generation` is still the running one.
    fn stop_generation(&self, generation: Option<u64>) {
        let stopped = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(current) if generation.map_or(true, |g| g == current.generation) => {
                    active.take()
                }
                _ => None,
            }
        };

        if let Some(active) = stopped {
            active.subscription.unsubscribe();
            dispatcher::with_default(&self.dispatch, || {
                tracing::debug!("Discovery has been stopped");
            });
        }
    }
}

/// Keeps one subscription on every subject and records what it sees.
pub struct DiscoveryFeed {
    bus: Arc<dyn Bus>,
    registry: Arc<SubjectRegistry>,
    shared: Arc<Shared>,
}

impl DiscoveryFeed {
    /// Create a feed logging through the caller's current dispatcher.
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self::with_dispatch(bus, current_dispatch())
    }

    pub fn with_dispatch(bus: Arc<dyn Bus>, dispatch: Dispatch) -> Self {
        Self {
            bus,
            registry: Arc::new(SubjectRegistry::new()),
            shared: Arc::new(Shared {
                active: Mutex::new(None),
                next_generation: AtomicU64::new(0),
                dispatch,
            }),
        }
    }

    /// Subscribe to every subject until `cancel` fires or [`stop`] is called.
    ///
    /// Fails with `AlreadyStarted` while the subscription is live. A
    /// subscription the bus has already closed is replaced.
    ///
    /// Admission control is left to the transport through `limits`; messages
    /// it drops are simply never counted.
    ///
    /// [`stop`]: DiscoveryFeed::stop
    pub fn start(&self, cancel: &CancelToken, limits: PendingLimits) -> Result<()> {
        let mut active = self.shared.active.lock();
        let stale = match active.as_ref() {
            Some(current) if current.subscription.is_active() => {
                return Err(MonitorError::AlreadyStarted);
            }
            Some(current) => Some(current.generation),
            None => None,
        };
        if let Some(generation) = stale {
            if let Some(dead) = active.take() {
                dead.subscription.unsubscribe();
            }
            dispatcher::with_default(&self.shared.dispatch, || {
                tracing::debug!(generation, "Replacing closed discovery subscription");
            });
        }

        let registry = Arc::clone(&self.registry);
        let dispatch = self.shared.dispatch.clone();
        let handler: MessageHandler = Arc::new(move |msg: BusMessage| {
            if registry.record(&msg.subject) {
                dispatcher::with_default(&dispatch, || {
                    tracing::debug!(subject = %msg.subject, "New subject discovered");
                });
            }
        });

        let subscription = self.bus.subscribe(ALL_SUBJECTS, handler)?;
        subscription.set_pending_limits(limits);

        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed) + 1;

        let (release_tx, release_rx) = bounded::<()>(0);
        let shared = Arc::clone(&self.shared);
        let cancel = cancel.clone();
        let spawned = thread::Builder::new()
            .name("discovery-watcher".to_string())
            .spawn(move || {
                select! {
                    recv(cancel.signal()) -> _ => shared.stop_generation(Some(generation)),
                    recv(release_rx) -> _ => {}
                }
            });

        if let Err(e) = spawned {
            subscription.unsubscribe();
            return Err(MonitorError::Io(e));
        }

        *active = Some(Active {
            subscription,
            generation,
            _release: release_tx,
        });
        drop(active);

        dispatcher::with_default(&self.shared.dispatch, || {
            tracing::info!(
                pending_messages = limits.messages,
                pending_bytes = limits.bytes,
                "Discovery started"
            );
        });
        Ok(())
    }

    /// Tear down the subscription. Safe to call repeatedly or before start.
    pub fn stop(&self) {
        self.shared.stop_generation(None);
    }

    /// Whether the wildcard subscription is live.
    pub fn is_active(&self) -> bool {
        self.shared
            .active
            .lock()
            .as_ref()
            .map_or(false, |a| a.subscription.is_active())
    }

    /// Shared handle to the registry this feed writes into.
    pub fn registry(&self) -> Arc<SubjectRegistry> {
        Arc::clone(&self.registry)
    }

    /// All discovered subjects.
    pub fn subjects(&self) -> Vec<SubjectStat> {
        self.registry.snapshot_all()
    }

    /// Statistics for one subject.
    pub fn subject(&self, name: &str) -> Option<SubjectStat> {
        self.registry.get(name)
    }
}

impl Drop for DiscoveryFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
