//! Live session records. The registry owns every active `ZoneSession`, the
//! sealed token minted for it, and the cancellable handle of its monitoring
//! task; terminating a session aborts that task in the same operation so no
//! monitor can outlive its session.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::events::{SecurityEvent, SecurityEventKind, SecurityEventSink};
use crate::policy::{SecurityZone, ZoneAccessRequirements};
use crate::sealer::{SealError, SealedToken, Sealer, TokenPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Manual,
    Expired,
    SuspiciousActivity,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::Manual => "manual",
            TerminationReason::Expired => "expired",
            TerminationReason::SuspiciousActivity => "suspicious_activity",
        }
    }
}

/// A granted, time-bounded authorization for one user in one zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSession {
    pub session_id: String,
    pub user_id: String,
    pub zone: SecurityZone,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub biometric_confidence: f64,
    pub ai_trust_score: f64,
    pub monitored: bool,
    pub sealed_token: SealedToken,
}

struct SessionEntry {
    session: ZoneSession,
    monitor: Option<JoinHandle<()>>,
}

fn gen_id() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    sealer: Arc<dyn Sealer>,
    sink: Arc<dyn SecurityEventSink>,
}

impl SessionRegistry {
    pub fn new(sealer: Arc<dyn Sealer>, sink: Arc<dyn SecurityEventSink>) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), sealer, sink }
    }

    /// Mint a session for a user that has passed every gate: generate the id,
    /// seal the token payload, compute the expiry from the zone's timeout and
    /// store the record.
    pub fn create_session(
        &self,
        user_id: &str,
        zone: SecurityZone,
        reqs: &ZoneAccessRequirements,
        biometric_confidence: f64,
        ai_trust_score: f64,
    ) -> Result<ZoneSession, SealError> {
        let now = Utc::now();
        let session_id = gen_id();
        let sealed_token = self.sealer.seal(&TokenPayload::mint(user_id, zone))?;
        let session = ZoneSession {
            session_id: session_id.clone(),
            user_id: user_id.to_string(),
            zone,
            started_at: now,
            last_activity: now,
            expires_at: now + Duration::seconds(reqs.session_timeout_secs as i64),
            biometric_confidence,
            ai_trust_score,
            monitored: reqs.continuous_monitoring,
            sealed_token,
        };
        self.sessions
            .write()
            .insert(session_id.clone(), SessionEntry { session: session.clone(), monitor: None });
        tracing::info!(
            user = %user_id, zone = %zone, session = %session_id,
            timeout_secs = reqs.session_timeout_secs, "session created"
        );
        Ok(session)
    }

    /// Bind a spawned monitor task to its session. If the session vanished in
    /// the meantime the orphan task is aborted on the spot.
    pub fn attach_monitor(&self, session_id: &str, handle: JoinHandle<()>) {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(session_id) {
            Some(entry) => entry.monitor = Some(handle),
            None => handle.abort(),
        }
    }

    /// Read-only validity check: present and not yet expired. Expired
    /// records are left in place for the sweeper or explicit termination.
    pub fn is_session_valid(&self, session_id: &str) -> bool {
        let sessions = self.sessions.read();
        match sessions.get(session_id) {
            Some(entry) => Utc::now() < entry.session.expires_at,
            None => false,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<ZoneSession> {
        self.sessions.read().get(session_id).map(|e| e.session.clone())
    }

    /// Refresh the activity timestamp. Returns false for unknown sessions.
    pub fn touch(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(session_id) {
            Some(entry) => {
                entry.session.last_activity = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove the session, abort its monitor task and emit SESSION_TERMINATED.
    /// Returns the removed record, or None if the id was unknown.
    pub fn terminate_session(&self, session_id: &str, reason: TerminationReason) -> Option<ZoneSession> {
        let entry = self.sessions.write().remove(session_id)?;
        if let Some(handle) = entry.monitor {
            handle.abort();
        }
        let session = entry.session;
        self.sink.emit(
            SecurityEvent::new(SecurityEventKind::SessionTerminated, &session.user_id)
                .with_session(session_id)
                .with_zone(session.zone)
                .with_reason(reason.as_str()),
        );
        tracing::info!(
            user = %session.user_id, zone = %session.zone, session = %session_id,
            reason = reason.as_str(), "session terminated"
        );
        Some(session)
    }

    /// Sweep expired records. Each removal goes through `terminate_session`
    /// so monitor handles and events are handled uniformly.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = {
            let sessions = self.sessions.read();
            sessions
                .iter()
                .filter(|(_, e)| e.session.expires_at <= now)
                .map(|(id, _)| id.clone())
                .collect()
        };
        let mut removed = 0;
        for id in expired {
            if self.terminate_session(&id, TerminationReason::Expired).is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventSink;
    use crate::policy::{SecurityZone, ZonePolicyTable};
    use crate::sealer::HybridSealer;

    fn registry_with_sink() -> (SessionRegistry, Arc<MemoryEventSink>) {
        let sink = Arc::new(MemoryEventSink::new());
        let sealer = Arc::new(HybridSealer::generate().unwrap());
        (SessionRegistry::new(sealer, sink.clone()), sink)
    }

    #[test]
    fn created_session_is_valid_and_expiry_matches_policy() {
        let (reg, _sink) = registry_with_sink();
        let reqs = ZonePolicyTable::builtin().get(SecurityZone::Public).clone();
        let s = reg.create_session("ivy", SecurityZone::Public, &reqs, 1.0, 1.0).unwrap();
        assert!(reg.is_session_valid(&s.session_id));
        assert_eq!((s.expires_at - s.started_at).num_seconds(), 3600);
        assert!(!s.monitored);
        assert!(reg.touch(&s.session_id));
        assert!(!reg.touch("no-such-session"));
    }

    #[test]
    fn zero_timeout_session_is_invalid_but_still_present() {
        let (reg, _sink) = registry_with_sink();
        let mut reqs = ZonePolicyTable::builtin().get(SecurityZone::Public).clone();
        reqs.session_timeout_secs = 0;
        let s = reg.create_session("ivy", SecurityZone::Public, &reqs, 1.0, 1.0).unwrap();
        // Validity checks are read-only; the expired record stays until swept
        assert!(!reg.is_session_valid(&s.session_id));
        assert!(!reg.is_session_valid(&s.session_id));
        assert_eq!(reg.active_count(), 1);
        assert_eq!(reg.purge_expired(), 1);
        assert_eq!(reg.active_count(), 0);
    }

    #[test]
    fn terminate_emits_event_and_removes() {
        let (reg, sink) = registry_with_sink();
        let reqs = ZonePolicyTable::builtin().get(SecurityZone::Restricted).clone();
        let s = reg.create_session("ivy", SecurityZone::Restricted, &reqs, 1.0, 1.0).unwrap();
        let removed = reg.terminate_session(&s.session_id, TerminationReason::Manual).unwrap();
        assert_eq!(removed.session_id, s.session_id);
        assert!(reg.get(&s.session_id).is_none());
        let evs = sink.events();
        assert_eq!(evs.len(), 1);
        assert_eq!(evs[0].kind, SecurityEventKind::SessionTerminated);
        assert_eq!(evs[0].reason.as_deref(), Some("manual"));
        // Second terminate is a no-op
        assert!(reg.terminate_session(&s.session_id, TerminationReason::Manual).is_none());
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn purge_leaves_live_sessions_alone() {
        let (reg, _sink) = registry_with_sink();
        let live = ZonePolicyTable::builtin().get(SecurityZone::Public).clone();
        let mut dead = live.clone();
        dead.session_timeout_secs = 0;
        let s_live = reg.create_session("ivy", SecurityZone::Public, &live, 1.0, 1.0).unwrap();
        let _ = reg.create_session("ivy", SecurityZone::Public, &dead, 1.0, 1.0).unwrap();
        assert_eq!(reg.purge_expired(), 1);
        assert!(reg.is_session_valid(&s_live.session_id));
    }

    #[test]
    fn sealed_token_opens_to_minted_user_and_zone() {
        let sink = Arc::new(MemoryEventSink::new());
        let sealer = Arc::new(HybridSealer::generate().unwrap());
        let reg = SessionRegistry::new(sealer.clone(), sink);
        let reqs = ZonePolicyTable::builtin().get(SecurityZone::Classified).clone();
        let s = reg.create_session("ivy", SecurityZone::Classified, &reqs, 0.97, 0.99).unwrap();
        use crate::sealer::Sealer;
        let payload = sealer.open(&s.sealed_token).unwrap();
        assert_eq!(payload.user_id, "ivy");
        assert_eq!(payload.zone, SecurityZone::Classified);
    }
}
