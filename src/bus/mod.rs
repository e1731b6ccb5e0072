//! Publish/subscribe transport seam.
//!
//! The engine never owns a connection. It is handed something implementing
//! [`Bus`] and only ever subscribes, unsubscribes and adjusts pending limits:
//! - [`Bus::subscribe`] registers a handler for a subject pattern
//! - [`BusSubscription::unsubscribe`] stops delivery (idempotent)
//! - [`BusSubscription::set_pending_limits`] caps queued messages and bytes
//!
//! [`LocalBus`] is an in-process implementation used to drive the engine
//! without an external broker.
//!
//! # Example
//!
//! ```ignore
//! let bus = LocalBus::new();
//! let sub = bus.subscribe("orders.>", Arc::new(|msg: BusMessage| {
//!     println!("{} bytes on {}", msg.size(), msg.subject);
//! }))?;
//! sub.set_pending_limits(PendingLimits::from_megabytes(10_000, 50));
//!
//! bus.publish("orders.new", b"{}".to_vec())?;
//! sub.unsubscribe();
//! ```

mod local;

pub use local::LocalBus;

use crate::error::Result;
use crate::types::BusMessage;
use std::sync::Arc;

/// Callback invoked for every delivered message.
pub type MessageHandler = Arc<dyn Fn(BusMessage) + Send + Sync>;

/// Caps on messages queued for a subscription but not yet handled.
///
/// A zero field disables that limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingLimits {
    pub messages: usize,
    pub bytes: usize,
}

impl PendingLimits {
    pub fn new(messages: usize, bytes: usize) -> Self {
        Self { messages, bytes }
    }

    /// Limits with the byte cap given in megabytes.
    pub fn from_megabytes(messages: usize, megabytes: usize) -> Self {
        Self {
            messages,
            bytes: megabytes.saturating_mul(1024 * 1024),
        }
    }

    /// No caps at all.
    pub fn unlimited() -> Self {
        Self {
            messages: 0,
            bytes: 0,
        }
    }

    /// Whether `messages` queued messages totalling `bytes` exceed a cap.
    pub fn exceeded_by(&self, messages: usize, bytes: usize) -> bool {
        (self.messages > 0 && messages > self.messages) || (self.bytes > 0 && bytes > self.bytes)
    }
}

impl Default for PendingLimits {
    fn default() -> Self {
        Self::from_megabytes(65_536, 64)
    }
}

/// An already-connected publish/subscribe session.
pub trait Bus: Send + Sync {
    /// Deliver every message matching `pattern` to `handler`.
    fn subscribe(&self, pattern: &str, handler: MessageHandler)
        -> Result<Box<dyn BusSubscription>>;
}

impl<B: Bus + ?Sized> Bus for Arc<B> {
    fn subscribe(
        &self,
        pattern: &str,
        handler: MessageHandler,
    ) -> Result<Box<dyn BusSubscription>> {
        (**self).subscribe(pattern, handler)
    }
}

/// Handle to one live subscription.
pub trait BusSubscription: Send + Sync {
    /// Pattern this subscription was created with.
    fn pattern(&self) -> &str;

    /// Stop delivery. Safe to call more than once.
    fn unsubscribe(&self);

    /// Replace the pending limits.
    fn set_pending_limits(&self, limits: PendingLimits);

    /// False once unsubscribed or the bus closed.
    fn is_active(&self) -> bool;

    /// Messages discarded because pending limits were exceeded.
    fn dropped(&self) -> u64;
}
