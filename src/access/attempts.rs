//! Per-user failed-attempt counters driving lockout. Thresholds come from
//! the zone the caller is asking about, never from global constants, so the
//! same user can be locked out of UltraClassified while still eligible for
//! Public.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::policy::ZoneAccessRequirements;

#[derive(Debug, Clone)]
pub struct FailedAttemptRecord {
    pub count: u32,
    pub last_attempt: DateTime<Utc>,
}

/// All operations take one lock over the whole map, so check/increment pairs
/// from concurrent requests cannot lose updates.
#[derive(Debug, Default)]
pub struct FailedAttemptTracker {
    records: RwLock<HashMap<String, FailedAttemptRecord>>,
}

impl FailedAttemptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more failure for the user, returning the new count.
    pub fn record_failure(&self, user_id: &str) -> u32 {
        let mut records = self.records.write();
        let rec = records
            .entry(user_id.to_string())
            .or_insert(FailedAttemptRecord { count: 0, last_attempt: Utc::now() });
        rec.count += 1;
        rec.last_attempt = Utc::now();
        rec.count
    }

    /// Clear the record on successful access.
    pub fn clear(&self, user_id: &str) {
        self.records.write().remove(user_id);
    }

    /// Cooldown predicate against the requesting zone's own thresholds.
    /// A record whose cooldown window has fully elapsed is pruned here
    /// (the implicit reset), so a later failure starts counting from one.
    pub fn in_cooldown(&self, user_id: &str, reqs: &ZoneAccessRequirements) -> bool {
        let mut records = self.records.write();
        let Some(rec) = records.get(user_id) else { return false };
        let elapsed = Utc::now() - rec.last_attempt;
        if elapsed >= Duration::seconds(reqs.cooldown_secs as i64) {
            records.remove(user_id);
            return false;
        }
        rec.count >= reqs.max_failed_attempts
    }

    pub fn failure_count(&self, user_id: &str) -> u32 {
        self.records.read().get(user_id).map(|r| r.count).unwrap_or(0)
    }
}
