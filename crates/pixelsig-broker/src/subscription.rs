//! Subscription graph
//!
//! Directed player→streamer edges with a per-streamer capacity cap. The
//! capacity check is atomic with insertion: every mutation of a streamer's
//! subscriber set happens under that streamer's mutex, and the reverse
//! player→streamer map is updated in the same critical section, so the two
//! sides can never disagree. Operations on different streamers proceed in
//! parallel.
//!
//! The graph stores ids only and never performs I/O under a lock; mutating
//! calls return the affected ids and the caller does the notifying.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::connection::ConnectionId;

/// Result of a bind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Edge created; `count` is the streamer's new subscriber count.
    Bound { count: usize },
    /// The streamer is at its cap; the set is untouched.
    AtCapacity,
    /// The streamer is unknown or already tearing down.
    StreamerInactive,
}

impl BindOutcome {
    pub fn is_bound(&self) -> bool {
        matches!(self, BindOutcome::Bound { .. })
    }
}

struct StreamerSubs {
    subscribers: BTreeSet<ConnectionId>,
    capacity: usize,
    active: bool,
}

struct StreamerEntry {
    state: Mutex<StreamerSubs>,
}

#[derive(Default)]
pub struct SubscriptionGraph {
    streamers: DashMap<ConnectionId, Arc<StreamerEntry>>,
    /// Reverse index: player → subscribed streamer. At most one edge per
    /// player.
    players: DashMap<ConnectionId, ConnectionId>,
}

impl SubscriptionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a streamer bindable. Idempotent; a re-register keeps the
    /// existing subscriber set.
    pub fn register_streamer(&self, streamer: ConnectionId, capacity: usize) {
        self.streamers.entry(streamer).or_insert_with(|| {
            Arc::new(StreamerEntry {
                state: Mutex::new(StreamerSubs {
                    subscribers: BTreeSet::new(),
                    capacity,
                    active: true,
                }),
            })
        });
    }

    /// Bind a player to a streamer. Any existing edge from the player is
    /// removed first: a player has at most one outbound edge. Callers that
    /// need to notify the previous streamer call [`Self::unbind`] themselves
    /// before binding.
    pub fn bind(&self, player: ConnectionId, streamer: ConnectionId) -> BindOutcome {
        // Drop any prior edge before taking the target's lock so two
        // streamer mutexes are never held at once.
        self.unbind(player);

        let Some(entry) = self.streamers.get(&streamer).map(|e| Arc::clone(e.value())) else {
            return BindOutcome::StreamerInactive;
        };

        let mut state = entry.state.lock();
        if !state.active {
            return BindOutcome::StreamerInactive;
        }
        if state.subscribers.len() >= state.capacity {
            return BindOutcome::AtCapacity;
        }
        state.subscribers.insert(player);
        self.players.insert(player, streamer);
        BindOutcome::Bound {
            count: state.subscribers.len(),
        }
    }

    /// Remove the player's edge, if any. Idempotent. Returns the streamer it
    /// was bound to and that streamer's new subscriber count.
    pub fn unbind(&self, player: ConnectionId) -> Option<(ConnectionId, usize)> {
        let streamer = *self.players.get(&player)?;
        let entry = self.streamers.get(&streamer).map(|e| Arc::clone(e.value()));

        match entry {
            Some(entry) => {
                let mut state = entry.state.lock();
                // Re-check under the lock; a concurrent sweep may have won.
                if self.players.remove_if(&player, |_, s| *s == streamer).is_none() {
                    return None;
                }
                state.subscribers.remove(&player);
                Some((streamer, state.subscribers.len()))
            }
            None => {
                // Streamer record already swept; just clear the reverse edge.
                self.players.remove(&player).map(|(_, s)| (s, 0))
            }
        }
    }

    /// Remove every edge incident to the streamer and retire its record.
    /// Returns the unbound players so the caller can notify them.
    pub fn sweep_streamer(&self, streamer: ConnectionId) -> Vec<ConnectionId> {
        let Some((_, entry)) = self.streamers.remove(&streamer) else {
            return Vec::new();
        };

        let swept: Vec<ConnectionId> = {
            let mut state = entry.state.lock();
            state.active = false;
            std::mem::take(&mut state.subscribers).into_iter().collect()
        };

        for player in &swept {
            self.players.remove_if(player, |_, s| *s == streamer);
        }
        swept
    }

    pub fn subscribed_streamer(&self, player: ConnectionId) -> Option<ConnectionId> {
        self.players.get(&player).map(|entry| *entry.value())
    }

    pub fn is_subscriber(&self, streamer: ConnectionId, player: ConnectionId) -> bool {
        self.subscribed_streamer(player) == Some(streamer)
    }

    pub fn subscribers(&self, streamer: ConnectionId) -> Vec<ConnectionId> {
        match self.streamers.get(&streamer) {
            Some(entry) => entry.state.lock().subscribers.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    pub fn subscriber_count(&self, streamer: ConnectionId) -> usize {
        match self.streamers.get(&streamer) {
            Some(entry) => entry.state.lock().subscribers.len(),
            None => 0,
        }
    }

    pub fn has_capacity(&self, streamer: ConnectionId) -> bool {
        match self.streamers.get(&streamer) {
            Some(entry) => {
                let state = entry.state.lock();
                state.active && state.subscribers.len() < state.capacity
            }
            None => false,
        }
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.players.len()
    }
}
