//! Interval gate for backend maintenance commands.

use chrono::{DateTime, Duration, Utc};

/// Fires a maintenance command at most once per interval.
///
/// A timer with no interval never fires. A timer that never fired is due
/// immediately.
#[derive(Debug, Clone)]
pub struct MaintenanceTimer {
    interval: Option<Duration>,
    last_fired: Option<DateTime<Utc>>,
}

impl MaintenanceTimer {
    /// Timer firing every `minutes` minutes; 0 disables it.
    pub fn from_minutes(minutes: u64) -> Self {
        let interval = if minutes > 0 {
            Some(Duration::minutes(minutes as i64))
        } else {
            None
        };
        Self {
            interval,
            last_fired: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        self.last_fired
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match (self.interval, self.last_fired) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(interval), Some(last)) => now - last >= interval,
        }
    }

    /// Mark fired if due. Returns whether the caller should fire.
    pub fn try_fire(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_due(now) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }
}
