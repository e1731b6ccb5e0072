//! Core types shared by the engine components.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0).max(0) as u64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Ordered, multi-valued message metadata.
///
/// Keys keep insertion order and may repeat; lookups are exact-match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a value, keeping any existing values for the same key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Builder form of [`Headers::append`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(key, value);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A message as handed over by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
    pub headers: Headers,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            headers: Headers::new(),
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Bytes counted against a subscription's pending byte limit.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// A message retained for inspection. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub subject: String,
    pub payload: Vec<u8>,
    pub received_at: Timestamp,
    pub headers: Headers,
}

impl Message {
    /// Stamp a delivered bus message with the current time.
    pub fn received(msg: BusMessage) -> Self {
        Self {
            subject: msg.subject,
            payload: msg.payload,
            received_at: Timestamp::now(),
            headers: msg.headers,
        }
    }

    /// Payload decoded as UTF-8, invalid sequences replaced.
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Point-in-time statistics for one subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubjectStat {
    pub name: String,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub count: u64,
}

/// One child of a navigation path, derived per query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubjectNode {
    /// Next path token.
    pub name: String,
    /// Some subject ends exactly at this token.
    pub is_leaf: bool,
    /// Some subject continues past this token.
    pub has_children: bool,
    /// Sum of counts of every subject under this token.
    pub message_count: u64,
}
