//! Concurrent subject statistics.

use crate::types::{SubjectStat, Timestamp};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Live counters for one subject.
struct SubjectEntry {
    first_seen: Timestamp,
    last_seen: AtomicI64,
    count: AtomicU64,
}

impl SubjectEntry {
    fn new(now: Timestamp) -> Self {
        Self {
            first_seen: now,
            last_seen: AtomicI64::new(now.0),
            count: AtomicU64::new(1),
        }
    }

    fn touch(&self, now: Timestamp) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.last_seen.store(now.0, Ordering::Relaxed);
    }

    fn stat(&self, name: &str) -> SubjectStat {
        SubjectStat {
            name: name.to_string(),
            first_seen: self.first_seen,
            last_seen: Timestamp(self.last_seen.load(Ordering::Relaxed)),
            count: self.count.load(Ordering::Relaxed),
        }
    }
}

/// Map from subject name to its statistics.
///
/// Known subjects are updated under the shared read lock using atomic
/// counters, so deliveries for existing subjects never serialize. Only the
/// first sighting of a subject takes the write lock, and the
/// create-if-absent decision is re-checked there so concurrent first
/// sightings produce one entry and lose no increment.
#[derive(Default)]
pub struct SubjectRegistry {
    subjects: RwLock<HashMap<String, SubjectEntry>>,
}

impl SubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation of `subject`. Returns true if it was new.
    pub fn record(&self, subject: &str) -> bool {
        self.record_at(subject, Timestamp::now())
    }

    /// Record one observation with an explicit timestamp.
    pub fn record_at(&self, subject: &str, now: Timestamp) -> bool {
        if let Some(entry) = self.subjects.read().get(subject) {
            entry.touch(now);
            return false;
        }

        let mut subjects = self.subjects.write();
        match subjects.entry(subject.to_string()) {
            Entry::Occupied(entry) => {
                entry.get().touch(now);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(SubjectEntry::new(now));
                true
            }
        }
    }

    /// Copy of every subject's statistics, sorted by name.
    pub fn snapshot_all(&self) -> Vec<SubjectStat> {
        let mut stats: Vec<SubjectStat> = {
            let subjects = self.subjects.read();
            subjects
                .iter()
                .map(|(name, entry)| entry.stat(name))
                .collect()
        };
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Statistics for one subject.
    pub fn get(&self, subject: &str) -> Option<SubjectStat> {
        self.subjects
            .read()
            .get(subject)
            .map(|entry| entry.stat(subject))
    }

    /// Number of distinct subjects seen.
    pub fn len(&self) -> usize {
        self.subjects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.read().is_empty()
    }

    /// Sum of all observation counts.
    pub fn total_messages(&self) -> u64 {
        self.subjects
            .read()
            .values()
            .map(|entry| entry.count.load(Ordering::Relaxed))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_record_new_then_existing() {
        let registry = SubjectRegistry::new();

        assert!(registry.record_at("orders.new", Timestamp(10)));
        assert!(!registry.record_at("orders.new", Timestamp(20)));

        let stat = registry.get("orders.new").unwrap();
        assert_eq!(stat.count, 2);
        assert_eq!(stat.first_seen, Timestamp(10));
        assert_eq!(stat.last_seen, Timestamp(20));
    }

    #[test]
    fn test_first_seen_is_fixed() {
        let registry = SubjectRegistry::new();
        registry.record_at("a", Timestamp(5));
        registry.record_at("a", Timestamp(50));
        registry.record_at("a", Timestamp(500));

        assert_eq!(registry.get("a").unwrap().first_seen, Timestamp(5));
    }

    #[test]
    fn test_last_seen_follows_latest_record() {
        let registry = SubjectRegistry::new();
        registry.record_at("a", Timestamp(100));
        registry.record_at("a", Timestamp(40));

        // Clock stepped back: the most recent observation still wins
        let stat = registry.get("a").unwrap();
        assert_eq!(stat.last_seen, Timestamp(40));
        assert_eq!(stat.first_seen, Timestamp(100));
        assert_eq!(stat.count, 2);
    }

    #[test]
    fn test_get_absent() {
        let registry = SubjectRegistry::new();
        assert!(registry.get("nothing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_sorted_copy() {
        let registry = SubjectRegistry::new();
        registry.record("b.x");
        registry.record("a.y");
        registry.record("a.y");

        let snapshot = registry.snapshot_all();
        let names: Vec<&str> = snapshot.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a.y", "b.x"]);

        // Snapshot is detached from later updates
        registry.record("a.y");
        assert_eq!(snapshot[0].count, 2);
        assert_eq!(registry.get("a.y").unwrap().count, 3);
        assert_eq!(registry.total_messages(), 4);
    }

    #[test]
    fn test_concurrent_first_sighting() {
        const THREADS: usize = 16;
        let registry = Arc::new(SubjectRegistry::new());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.record("x")
                })
            })
            .collect();

        let created: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(created, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x").unwrap().count, THREADS as u64);
    }
}
