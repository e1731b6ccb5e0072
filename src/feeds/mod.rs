//! Subscriptions that feed the engine's stores.
//!
//! - [`DiscoveryFeed`]: one wildcard subscription for the lifetime of a
//!   [`CancelToken`], recording every subject into a `SubjectRegistry`
//! - [`InspectionFeed`]: at most one subscription to an operator-chosen
//!   subject, buffering its messages in a `MessageWindow`
//!
//! Both feeds only ever hand out copies of their stores.

mod cancel;
mod discovery;
mod inspection;

pub use cancel::CancelToken;
pub use discovery::DiscoveryFeed;
pub use inspection::{InspectionFeed, InspectionState};
