//! Connection registry
//!
//! Process-wide index of live connections, one concurrent map per role. An
//! internal id appears in at most one map at any time. The registry fires no
//! events; lifecycle notifications happen in the role handlers.

use std::sync::Arc;

use dashmap::DashMap;

use pixelsig_core::Role;

use crate::connection::{Connection, ConnectionId};
use crate::subscription::SubscriptionGraph;

#[derive(Debug, Default)]
pub struct Registry {
    players: DashMap<ConnectionId, Arc<Connection>>,
    streamers: DashMap<ConnectionId, Arc<Connection>>,
    sfus: DashMap<ConnectionId, Arc<Connection>>,
}

/// Point-in-time connection counts, for the status log and the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub players: usize,
    pub streamers: usize,
    pub sfus: usize,
    pub total_subscriptions: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, role: Role) -> &DashMap<ConnectionId, Arc<Connection>> {
        match role {
            Role::Player => &self.players,
            Role::Streamer => &self.streamers,
            Role::Sfu => &self.sfus,
        }
    }

    pub fn add(&self, conn: Arc<Connection>) {
        let map = self.map(conn.role());
        map.insert(conn.id(), conn);
    }

    /// Remove by id. Returns the connection on first removal, `None` after,
    /// which is what makes teardown idempotent.
    pub fn remove(&self, role: Role, id: ConnectionId) -> Option<Arc<Connection>> {
        self.map(role).remove(&id).map(|(_, conn)| conn)
    }

    pub fn get(&self, role: Role, id: ConnectionId) -> Option<Arc<Connection>> {
        self.map(role).get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn enumerate(&self, role: Role) -> Vec<Arc<Connection>> {
        self.map(role)
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn count(&self, role: Role) -> usize {
        self.map(role).len()
    }

    /// Live streamers ordered earliest-connected first, ties broken by
    /// internal id. This is the selection order for player auto-binding;
    /// deterministic for a fixed live-set.
    pub fn streamer_candidates(&self) -> Vec<Arc<Connection>> {
        let mut candidates: Vec<_> = self
            .streamers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .filter(|conn| conn.is_connected())
            .collect();
        candidates.sort_by_key(|conn| (conn.connected_at(), conn.id()));
        candidates
    }

    /// First streamer with spare capacity, in candidate order.
    pub fn find_available_streamer(&self, graph: &SubscriptionGraph) -> Option<Arc<Connection>> {
        self.streamer_candidates()
            .into_iter()
            .find(|conn| graph.has_capacity(conn.id()))
    }

    pub fn stats(&self, graph: &SubscriptionGraph) -> ConnectionStats {
        ConnectionStats {
            players: self.players.len(),
            streamers: self.streamers.len(),
            sfus: self.sfus.len(),
            total_subscriptions: graph.edge_count(),
        }
    }
}
