//! Monitor façade tying the feeds and the hierarchy view together.

use crate::bus::Bus;
use crate::config::EngineLimits;
use crate::error::Result;
use crate::feeds::{CancelToken, DiscoveryFeed, InspectionFeed};
use crate::hierarchy;
use crate::logging::current_dispatch;
use crate::types::{Message, SubjectNode, SubjectStat};
use std::sync::Arc;
use tracing::Dispatch;

/// The read-mostly surface a presentation layer polls.
///
/// Provides:
/// - Subject discovery over the whole namespace
/// - Per-subject counters and a navigable hierarchy
/// - A bounded message history for one inspected subject
///
/// Every read returns a copy; callers never hold engine locks.
pub struct Monitor {
    discovery: DiscoveryFeed,
    inspection: InspectionFeed,
    limits: EngineLimits,
}

impl Monitor {
    pub fn new(bus: Arc<dyn Bus>, limits: EngineLimits) -> Self {
        Self::with_dispatch(bus, limits, current_dispatch())
    }

    pub fn with_dispatch(bus: Arc<dyn Bus>, limits: EngineLimits, dispatch: Dispatch) -> Self {
        Self {
            discovery: DiscoveryFeed::with_dispatch(Arc::clone(&bus), dispatch.clone()),
            inspection: InspectionFeed::with_dispatch(
                bus,
                limits.inspection_capacity,
                limits.inspection_pending,
                dispatch,
            ),
            limits,
        }
    }

    /// Start discovery, bound to `cancel`.
    pub fn start(&self, cancel: &CancelToken) -> Result<()> {
        self.discovery.start(cancel, self.limits.discovery_pending)
    }

    // --- Discovery ---

    pub fn list_subjects(&self) -> Vec<SubjectStat> {
        self.discovery.subjects()
    }

    pub fn subject(&self, name: &str) -> Option<SubjectStat> {
        self.discovery.subject(name)
    }

    /// Children of `path` in the subject hierarchy.
    pub fn project_hierarchy<S: AsRef<str>>(&self, path: &[S]) -> Vec<SubjectNode> {
        hierarchy::project(&self.discovery.subjects(), path)
    }

    pub fn is_discovery_active(&self) -> bool {
        self.discovery.is_active()
    }

    // --- Inspection ---

    /// Inspect `name`, or stop inspecting if it is empty.
    pub fn watch_subject(&self, name: &str) -> Result<()> {
        self.inspection.watch(name)
    }

    pub fn watched_subject(&self) -> Option<String> {
        self.inspection.current_subject()
    }

    pub fn inspection_messages(&self) -> Vec<Message> {
        self.inspection.messages()
    }

    pub fn inspection_count(&self) -> usize {
        self.inspection.message_count()
    }

    /// Stop both feeds. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.inspection.stop();
        self.discovery.stop();
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }
}
