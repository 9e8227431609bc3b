use std::sync::Arc;

use dashmap::DashMap;

use gavel_core::ids::{ConnectionId, Identity};

use crate::connection::BidderConnection;

/// Live connections keyed by bidder identity.
///
/// At most one connection per identity: a new registration under an
/// already-registered identity replaces the entry, and the replaced
/// connection is handed back to the caller for teardown.
pub struct ConnectionRegistry {
    connections: DashMap<Identity, Arc<BidderConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Install the identity -> connection mapping unconditionally and
    /// return any connection it replaced.
    pub fn register(
        &self,
        identity: Identity,
        conn: Arc<BidderConnection>,
    ) -> Option<Arc<BidderConnection>> {
        self.connections.insert(identity, conn)
    }

    pub fn lookup(&self, identity: &Identity) -> Option<Arc<BidderConnection>> {
        self.connections
            .get(identity)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the identity's entry, but only while it still points at the
    /// given connection. A session tearing down after being superseded
    /// must not evict its successor. Returns whether an entry was removed.
    pub fn release(&self, identity: &Identity, conn_id: &ConnectionId) -> bool {
        self.connections
            .remove_if(identity, |_, conn| conn.id() == conn_id)
            .is_some()
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Copy the current entries out so callers can iterate and send
    /// without holding any map lock.
    pub fn snapshot(&self) -> Vec<(Identity, Arc<BidderConnection>)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_connection() -> Arc<BidderConnection> {
        BidderConnection::new(8).0
    }

    #[test]
    fn register_and_lookup_round_trip() {
        let registry = ConnectionRegistry::new();
        let conn = open_connection();
        let identity = Identity::new("bidder@example.com");

        assert!(registry.register(identity.clone(), Arc::clone(&conn)).is_none());
        assert_eq!(registry.count(), 1);

        let found = registry.lookup(&identity).unwrap();
        assert_eq!(found.id(), conn.id());
    }

    #[test]
    fn second_registration_replaces_and_returns_the_first() {
        let registry = ConnectionRegistry::new();
        let identity = Identity::new("bidder@example.com");
        let first = open_connection();
        let second = open_connection();

        registry.register(identity.clone(), Arc::clone(&first));
        let replaced = registry.register(identity.clone(), Arc::clone(&second)).unwrap();

        assert_eq!(replaced.id(), first.id());
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.lookup(&identity).unwrap().id(), second.id());
    }

    #[test]
    fn release_removes_only_the_matching_connection() {
        let registry = ConnectionRegistry::new();
        let identity = Identity::new("bidder@example.com");
        let old = open_connection();
        let new = open_connection();

        registry.register(identity.clone(), Arc::clone(&old));
        registry.register(identity.clone(), Arc::clone(&new));

        // The superseded connection's teardown must leave the successor alone.
        assert!(!registry.release(&identity, old.id()));
        assert_eq!(registry.count(), 1);

        assert!(registry.release(&identity, new.id()));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn release_of_unknown_identity_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        let conn = open_connection();
        assert!(!registry.release(&Identity::new("ghost"), conn.id()));
    }

    #[test]
    fn snapshot_copies_all_entries() {
        let registry = ConnectionRegistry::new();
        registry.register(Identity::new("a"), open_connection());
        registry.register(Identity::new("b"), open_connection());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        let mut identities: Vec<_> = snapshot.iter().map(|(id, _)| id.as_str()).collect();
        identities.sort_unstable();
        assert_eq!(identities, vec!["a", "b"]);
    }
}
