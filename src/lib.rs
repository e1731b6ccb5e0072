//! # Bus Lens
//!
//! Live observability for a publish/subscribe message bus: discover every
//! subject in flight, keep per-subject counters, and inspect the recent
//! payloads of one subject at a time.
//!
//! ## Core Concepts
//!
//! - **Registry**: concurrent per-subject counters and timestamps
//! - **Window**: bounded, arrival-ordered buffer of inspected messages
//! - **Feeds**: the discovery (wildcard) and inspection (single subject)
//!   subscriptions that fill them
//! - **Hierarchy**: a one-level tree view over dotted subject names,
//!   recomputed on every navigation step
//!
//! ## Example
//!
//! ```ignore
//! use buslens::{CancelToken, EngineLimits, LocalBus, Monitor};
//!
//! let bus = Arc::new(LocalBus::new());
//! let monitor = Monitor::new(bus.clone(), EngineLimits::default());
//!
//! let cancel = CancelToken::new();
//! monitor.start(&cancel)?;
//! monitor.watch_subject("orders.new")?;
//!
//! bus.publish("orders.new", b"{\"id\": 1}".to_vec())?;
//!
//! for node in monitor.project_hierarchy(&["orders"]) {
//!     println!("{} ({})", node.name, node.message_count);
//! }
//!
//! cancel.cancel();
//! monitor.shutdown();
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod feeds;
pub mod hierarchy;
pub mod logging;
pub mod monitor;
pub mod registry;
pub mod subject;
pub mod types;
pub mod window;

// Re-exports
pub use bus::{Bus, BusSubscription, LocalBus, MessageHandler, PendingLimits};
pub use config::{EngineLimits, MonitorConfig};
pub use error::{MonitorError, Result};
pub use feeds::{CancelToken, DiscoveryFeed, InspectionFeed, InspectionState};
pub use monitor::Monitor;
pub use registry::SubjectRegistry;
pub use types::*;
pub use window::MessageWindow;
