use std::collections::{BTreeMap, HashSet};

use dashmap::DashMap;

use gavel_core::ids::{Identity, Topic};

/// Subscriber sets keyed by auction topic.
///
/// Holds identities only, never connection handles, so a subscription can
/// outlive the connection that created it. Topics are not garbage
/// collected; the table stays bounded by the number of auctions the
/// backend runs.
pub struct TopicTable {
    topics: DashMap<Topic, HashSet<Identity>>,
}

impl TopicTable {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Idempotent: subscribing twice leaves a single entry.
    pub fn subscribe(&self, topic: Topic, identity: Identity) {
        self.topics.entry(topic).or_default().insert(identity);
    }

    /// Idempotent: the identity may already be absent. Empty subscriber
    /// sets are kept.
    pub fn unsubscribe(&self, topic: &Topic, identity: &Identity) {
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.remove(identity);
        }
    }

    /// Copy of the topic's subscriber set, so sends never happen under a
    /// map lock.
    pub fn subscribers_of(&self, topic: &Topic) -> Vec<Identity> {
        self.topics
            .get(topic)
            .map(|subscribers| subscribers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove the identity from every topic. Called when a connection is
    /// evicted or released.
    pub fn purge(&self, identity: &Identity) {
        for mut entry in self.topics.iter_mut() {
            entry.value_mut().remove(identity);
        }
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Per-topic subscriber counts for the stats surface. Sorted so the
    /// response body is stable.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.topics
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().len()))
            .collect()
    }
}

impl Default for TopicTable {
    fn default() -> Self {
        Self::new()
    }
}
