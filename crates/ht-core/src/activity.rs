//! Active/inactive state machine gating enqueue and dispatch.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Whether the user is currently considered to be coding.
///
/// Starts active with no recorded activity. The timeout only fires once some
/// activity has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityState {
    active: bool,
    last_activity: Option<DateTime<Utc>>,
}

impl Default for ActivityState {
    fn default() -> Self {
        Self {
            active: true,
            last_activity: None,
        }
    }
}

impl ActivityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn is_active(&self) -> bool {
        self.active
    }

    pub const fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    /// Records activity at `now`. Returns `true` if this reactivated tracking.
    pub fn touch(&mut self, now: DateTime<Utc>) -> bool {
        self.last_activity = Some(now);
        let reactivated = !self.active;
        self.active = true;
        reactivated
    }

    /// Transitions to inactive if idle for longer than `timeout`.
    ///
    /// Returns `true` only on the call that performs the transition; the
    /// caller is expected to clear pending heartbeats.
    pub fn check_timeout(&mut self, now: DateTime<Utc>, timeout: Duration) -> bool {
        if !self.active {
            return false;
        }
        let Some(last) = self.last_activity else {
            return false;
        };
        if elapsed(last, now) > timeout {
            self.active = false;
            return true;
        }
        false
    }

    /// Time since the last recorded activity, zero if there was none.
    pub fn since_last_activity(&self, now: DateTime<Utc>) -> Duration {
        self.last_activity
            .map_or(Duration::ZERO, |last| elapsed(last, now))
    }
}

/// Non-negative duration between two instants.
fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}
