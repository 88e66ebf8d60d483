//! Pending heartbeats, at most one per file.
//!
//! The queue is not synchronized itself; the engine keeps it behind the same
//! mutex as the fingerprint store so that a compare-and-enqueue is atomic.

use std::collections::HashMap;
use std::time::Duration;

use crate::heartbeat::Heartbeat;

/// Last-write-wins buffer of heartbeats keyed by entity path.
#[derive(Debug, Default)]
pub struct HeartbeatQueue {
    pending: Vec<Heartbeat>,
    last_heartbeat: HashMap<String, i64>,
}

impl HeartbeatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a heartbeat, evicting any pending one for the same entity.
    ///
    /// The new heartbeat goes to the back of the queue. Returns the evicted
    /// heartbeat, if any.
    pub fn enqueue(&mut self, heartbeat: Heartbeat) -> Option<Heartbeat> {
        let evicted = self
            .pending
            .iter()
            .position(|hb| hb.entity() == heartbeat.entity())
            .map(|idx| self.pending.remove(idx));

        self.last_heartbeat
            .insert(heartbeat.entity().to_string(), heartbeat.time());
        self.pending.push(heartbeat);
        evicted
    }

    /// Removes and returns every pending heartbeat in enqueue order.
    pub fn drain_all(&mut self) -> Vec<Heartbeat> {
        std::mem::take(&mut self.pending)
    }

    /// Discards every pending heartbeat, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Heartbeat] {
        &self.pending
    }

    /// Unix time of the last heartbeat enqueued for `entity`.
    pub fn last_heartbeat(&self, entity: &str) -> Option<i64> {
        self.last_heartbeat.get(entity).copied()
    }

    pub const fn last_heartbeats(&self) -> &HashMap<String, i64> {
        &self.last_heartbeat
    }

    /// True if `entity` had a heartbeat less than `interval` before `now`.
    pub fn is_rate_limited(&self, entity: &str, now: i64, interval: Duration) -> bool {
        let interval = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX);
        self.last_heartbeat(entity)
            .is_some_and(|last| now.saturating_sub(last) < interval)
    }
}
