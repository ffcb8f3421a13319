//! Security event emission. The sink is fire-and-forget: emitting never
//! blocks or fails the operation that produced the event, so the trait is
//! infallible by construction and implementations swallow their own faults.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::SecurityZone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    AccessGranted,
    AccessDenied,
    SessionTerminated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_id: Uuid,
    pub kind: SecurityEventKind,
    pub user_id: String,
    pub session_id: Option<String>,
    pub zone: Option<SecurityZone>,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind, user_id: &str) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            user_id: user_id.to_string(),
            session_id: None,
            zone: None,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_zone(mut self, zone: SecurityZone) -> Self {
        self.zone = Some(zone);
        self
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

pub trait SecurityEventSink: Send + Sync {
    fn emit(&self, event: SecurityEvent);
}

/// Default sink: structured log lines under the `zonegate::events` target.
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

impl SecurityEventSink for TracingEventSink {
    fn emit(&self, event: SecurityEvent) {
        tracing::info!(
            target: "zonegate::events",
            kind = ?event.kind,
            user = %event.user_id,
            session = event.session_id.as_deref().unwrap_or("-"),
            zone = event.zone.map(|z| z.name()).unwrap_or("-"),
            reason = event.reason.as_deref().unwrap_or("-"),
            "security event"
        );
    }
}

/// Test sink capturing events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().clone()
    }

    pub fn count_of(&self, kind: SecurityEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl SecurityEventSink for MemoryEventSink {
    fn emit(&self, event: SecurityEvent) {
        self.events.lock().push(event);
    }
}
