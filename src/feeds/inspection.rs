//! Single-subject subscription feeding the message window.

use crate::bus::{Bus, BusSubscription, MessageHandler, PendingLimits};
use crate::error::Result;
use crate::logging::current_dispatch;
use crate::types::{BusMessage, Message};
use crate::window::MessageWindow;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{dispatcher, Dispatch};

/// What the inspection feed is doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InspectionState {
    Idle,
    Watching(String),
}

struct Watching {
    subject: String,
    subscription: Box<dyn BusSubscription>,
}

/// Shows a bounded recent history of one subject at a time.
///
/// At most one subscription is live. Every `watch` tears down the previous
/// subscription and empties the window first, even when re-watching the
/// same subject.
pub struct InspectionFeed {
    bus: Arc<dyn Bus>,
    window: Arc<MessageWindow>,
    limits: PendingLimits,
    current: Mutex<Option<Watching>>,
    dispatch: Dispatch,
}

impl InspectionFeed {
    /// Create a feed retaining `capacity` messages.
    pub fn new(bus: Arc<dyn Bus>, capacity: usize, limits: PendingLimits) -> Self {
        Self::with_dispatch(bus, capacity, limits, current_dispatch())
    }

    pub fn with_dispatch(
        bus: Arc<dyn Bus>,
        capacity: usize,
        limits: PendingLimits,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            bus,
            window: Arc::new(MessageWindow::new(capacity)),
            limits,
            current: Mutex::new(None),
            dispatch,
        }
    }

    /// Point the feed at `subject`. An empty subject just stops ingestion.
    ///
    /// If subscribing fails the feed is left idle with an empty window.
    pub fn watch(&self, subject: &str) -> Result<()> {
        let mut current = self.current.lock();

        let epoch = self.window.clear();
        if let Some(previous) = current.take() {
            previous.subscription.unsubscribe();
        }

        if subject.is_empty() {
            return Ok(());
        }

        let window = Arc::clone(&self.window);
        let dispatch = self.dispatch.clone();
        let handler: MessageHandler = Arc::new(move |msg: BusMessage| {
            let message = Message::received(msg);
            dispatcher::with_default(&dispatch, || {
                tracing::debug!(
                    subject = %message.subject,
                    size = message.size(),
                    "Message received"
                );
            });
            // Rejected if a newer watch/stop cleared the window meanwhile.
            window.append_in_epoch(epoch, message);
        });

        let subscription = self.bus.subscribe(subject, handler)?;
        subscription.set_pending_limits(self.limits);

        *current = Some(Watching {
            subject: subject.to_string(),
            subscription,
        });

        dispatcher::with_default(&self.dispatch, || {
            tracing::info!(subject = %subject, "Subscribed to subject");
        });
        Ok(())
    }

    /// Unsubscribe and empty the window. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            previous.subscription.unsubscribe();
        }
        self.window.clear();
        drop(current);

        dispatcher::with_default(&self.dispatch, || {
            tracing::debug!("Inspection has been stopped");
        });
    }

    pub fn state(&self) -> InspectionState {
        match self.current.lock().as_ref() {
            Some(watching) => InspectionState::Watching(watching.subject.clone()),
            None => InspectionState::Idle,
        }
    }

    /// Subject currently watched, if any.
    pub fn current_subject(&self) -> Option<String> {
        self.current.lock().as_ref().map(|w| w.subject.clone())
    }

    /// Buffered messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.window.snapshot_all()
    }

    pub fn message_count(&self) -> usize {
        self.window.count()
    }

    /// Maximum messages retained.
    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }
}
