//! Subscription table.

use super::config::MAX_TOPIC_LEN;
use super::error::Error;
use super::packet::QoS;
use heapless::{FnvIndexMap, String};

/// Most topic filters tracked at once. Must be a power of two.
pub const MAX_SUBSCRIPTIONS: usize = 8;

/// A topic filter as stored in the table.
pub type Topic = String<MAX_TOPIC_LEN>;

/// Topic filters this client has asked for, with the requested QoS.
///
/// Entries are added when a SUBSCRIBE is queued, before the broker confirms
/// it, and the whole table is cleared whenever the link drops: a fresh TCP
/// session carries no server-side subscriptions.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    entries: FnvIndexMap<Topic, QoS, MAX_SUBSCRIPTIONS>,
}

impl Subscriptions {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
        }
    }

    fn key(topic: &str) -> Option<Topic> {
        String::try_from(topic).ok()
    }

    /// `true` if `topic` is in the table.
    pub fn contains(&self, topic: &str) -> bool {
        Self::key(topic).is_some_and(|k| self.entries.contains_key(&k))
    }

    /// Requested QoS for `topic`.
    pub fn qos(&self, topic: &str) -> Option<QoS> {
        Self::key(topic).and_then(|k| self.entries.get(&k).copied())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` when no new topic can be added.
    pub fn is_full(&self) -> bool {
        self.entries.len() == MAX_SUBSCRIPTIONS
    }

    /// Iterate over `(topic, qos)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, QoS)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Add or update `topic`.
    pub(crate) fn insert(&mut self, topic: &str, qos: QoS) -> Result<(), Error> {
        let key = Self::key(topic).ok_or(Error::TopicTooLong)?;
        self.entries
            .insert(key, qos)
            .map(|_| ())
            .map_err(|_| Error::SubscriptionTableFull)
    }

    /// Remove `topic`. Returns `false` if it was not present.
    pub(crate) fn remove(&mut self, topic: &str) -> bool {
        Self::key(topic).is_some_and(|k| self.entries.remove(&k).is_some())
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
