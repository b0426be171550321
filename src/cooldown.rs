//! Per-vehicle alert debouncing.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Tracks the last alert time per vehicle and suppresses re-alerting within
/// the configured window.
///
/// `now` is injected by the caller so tests run against fixed instants. The
/// poll loop records a vehicle at dispatch-decision time, before actuation,
/// so a slow actuation call cannot let a second poll double-trigger the same
/// vehicle.
pub struct CooldownTracker {
    window: Duration,
    last_alert: HashMap<String, DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_alert: HashMap::new(),
        }
    }

    /// Returns `true` if no alert was recorded for the vehicle, or the last
    /// one is at least a full window old.
    pub fn may_alert(&self, vehicle_id: &str, now: DateTime<Utc>) -> bool {
        match self.last_alert.get(vehicle_id) {
            Some(last) => now - *last >= self.window,
            None => true,
        }
    }

    /// Overwrites the vehicle's last-alert time.
    pub fn record(&mut self, vehicle_id: &str, now: DateTime<Utc>) {
        self.last_alert.insert(vehicle_id.to_string(), now);
    }
}
