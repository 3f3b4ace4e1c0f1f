use std::collections::HashSet;

use dashmap::DashMap;

use crate::protocol::{ConnId, UserBrief, UserId};

/// Tracks which users are online and through which connections. A user with
/// several tabs open has several entries in their connection set; they are
/// "online" exactly while that set is non-empty.
#[derive(Debug, Default)]
pub struct Presence {
    connections: DashMap<UserId, HashSet<ConnId>>,
    profiles: DashMap<UserId, UserBrief>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. Returns `true` when this is the user's first
    /// live connection (they just came online).
    pub fn connect(&self, user: &UserBrief, conn_id: ConnId) -> bool {
        self.profiles.insert(user.user_id.clone(), user.clone());
        let mut entry = self
            .connections
            .entry(user.user_id.clone())
            .or_default();
        let was_offline = entry.is_empty();
        entry.insert(conn_id);
        was_offline
    }

    /// Drop a connection. Returns `true` when the user's set became empty
    /// (they just went offline). The entry-based removal keeps concurrent
    /// connect/disconnect for the same user from losing updates.
    pub fn disconnect(&self, user_id: &str, conn_id: ConnId) -> bool {
        let went_offline = match self.connections.entry(user_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                entry.get_mut().remove(&conn_id);
                if entry.get().is_empty() {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            dashmap::mapref::entry::Entry::Vacant(_) => false,
        };
        if went_offline {
            self.profiles.remove(user_id);
        }
        went_offline
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.connections
            .get(user_id)
            .is_some_and(|conns| !conns.is_empty())
    }

    /// All live connections of a user, for direct-addressed delivery.
    pub fn connections_of(&self, user_id: &str) -> Vec<ConnId> {
        self.connections
            .get(user_id)
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of everyone currently online, as `{userId, username}` pairs.
    pub fn online_users(&self) -> Vec<UserBrief> {
        self.profiles
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Drop all state. Test hook; also used at shutdown.
    pub fn clear(&self) {
        self.connections.clear();
        self.profiles.clear();
    }
}
