use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide counters for the session core. Everything is a relaxed
/// atomic; the numbers feed logs and the `/metrics` JSON view, not control
/// flow.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub frames_dropped: AtomicU64,

    // Room metrics
    pub rooms_created: AtomicU64,
    pub rooms_joined: AtomicU64,
    pub rooms_deleted: AtomicU64,

    // Game metrics
    pub games_started: AtomicU64,
    pub games_completed: AtomicU64,
    pub moves_applied: AtomicU64,
    pub moves_rejected: AtomicU64,
    pub draws_agreed: AtomicU64,
    pub rematches_started: AtomicU64,

    // Invite metrics
    pub invites_sent: AtomicU64,
    pub invites_rejected: AtomicU64,
}

/// Point-in-time copy of the counters, serializable for the metrics route.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub frames_dropped: u64,
    pub rooms_created: u64,
    pub rooms_joined: u64,
    pub rooms_deleted: u64,
    pub games_started: u64,
    pub games_completed: u64,
    pub moves_applied: u64,
    pub moves_rejected: u64,
    pub draws_agreed: u64,
    pub rematches_started: u64,
    pub invites_sent: u64,
    pub invites_rejected: u64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(counter: &AtomicU64) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_sub(1))
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_connections: load(&self.total_connections),
            active_connections: load(&self.active_connections),
            disconnections: load(&self.disconnections),
            frames_dropped: load(&self.frames_dropped),
            rooms_created: load(&self.rooms_created),
            rooms_joined: load(&self.rooms_joined),
            rooms_deleted: load(&self.rooms_deleted),
            games_started: load(&self.games_started),
            games_completed: load(&self.games_completed),
            moves_applied: load(&self.moves_applied),
            moves_rejected: load(&self.moves_rejected),
            draws_agreed: load(&self.draws_agreed),
            rematches_started: load(&self.rematches_started),
            invites_sent: load(&self.invites_sent),
            invites_rejected: load(&self.invites_rejected),
        }
    }
}
