//! Request orchestration: cooldown, clearance/credential, biometric and AI
//! trust gates, evaluated in that fixed order so cheap checks short-circuit
//! before expensive collaborator calls. Every business-rule failure comes
//! back as a `Denied` value; `Err` is reserved for internal faults (a broken
//! sealer) that no denial reason can honestly describe.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::access::monitor::ContinuousMonitor;
use crate::access::attempts::FailedAttemptTracker;
use crate::access::session::{SessionRegistry, TerminationReason, ZoneSession};
use crate::clearance::ClearanceStore;
use crate::credential::{BiometricSample, CredentialProof};
use crate::error::{AppError, AppResult};
use crate::events::{SecurityEvent, SecurityEventKind, SecurityEventSink};
use crate::policy::{
    ADMISSION_TRUST_FLOOR, BIOMETRIC_CONFIDENCE_FLOOR, CredentialType, SecurityZone,
    ZonePolicyTable,
};
use crate::verify::{BiometricVerifier, CredentialVerifier, TrustScorer};

/// Why a request was denied. Values, never exceptions, across the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    CooldownActive,
    InsufficientClearance,
    MissingCredential,
    InvalidCredential,
    BiometricRequired,
    BiometricFailed,
    AiTrustFailed,
    SessionNotFound,
    SessionExpired,
}

impl DenialReason {
    pub fn code(self) -> &'static str {
        match self {
            DenialReason::CooldownActive => "cooldown_active",
            DenialReason::InsufficientClearance => "insufficient_clearance",
            DenialReason::MissingCredential => "missing_credential",
            DenialReason::InvalidCredential => "invalid_credential",
            DenialReason::BiometricRequired => "biometric_required",
            DenialReason::BiometricFailed => "biometric_failed",
            DenialReason::AiTrustFailed => "ai_trust_failed",
            DenialReason::SessionNotFound => "session_not_found",
            DenialReason::SessionExpired => "session_expired",
        }
    }
}

impl Display for DenialReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One zone-access attempt as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneAccessRequest {
    pub user_id: String,
    pub zone: SecurityZone,
    pub credentials: Vec<CredentialProof>,
    #[serde(default)]
    pub biometric_sample: Option<BiometricSample>,
}

#[derive(Debug, Clone)]
pub enum AccessDecision {
    Granted(ZoneSession),
    Denied { reason: DenialReason },
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }

    pub fn session(&self) -> Option<&ZoneSession> {
        match self {
            AccessDecision::Granted(s) => Some(s),
            AccessDecision::Denied { .. } => None,
        }
    }

    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            AccessDecision::Granted(_) => None,
            AccessDecision::Denied { reason } => Some(*reason),
        }
    }
}

/// The four external seams the coordinator consumes.
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialVerifier>,
    pub biometric: Arc<dyn BiometricVerifier>,
    pub trust: Arc<dyn TrustScorer>,
    pub sink: Arc<dyn SecurityEventSink>,
}

pub struct ZoneAccessCoordinator {
    policy: ZonePolicyTable,
    clearance: Arc<ClearanceStore>,
    attempts: FailedAttemptTracker,
    registry: Arc<SessionRegistry>,
    collab: Collaborators,
    monitor: ContinuousMonitor,
    verify_timeout: Duration,
}

impl ZoneAccessCoordinator {
    pub fn new(
        policy: ZonePolicyTable,
        clearance: Arc<ClearanceStore>,
        registry: Arc<SessionRegistry>,
        collab: Collaborators,
        monitor_interval: Duration,
        verify_timeout: Duration,
    ) -> Self {
        let monitor = ContinuousMonitor::new(
            registry.clone(),
            collab.trust.clone(),
            monitor_interval,
            verify_timeout,
        );
        Self {
            policy,
            clearance,
            attempts: FailedAttemptTracker::new(),
            registry,
            collab,
            monitor,
            verify_timeout,
        }
    }

    pub fn policy(&self) -> &ZonePolicyTable {
        &self.policy
    }

    /// Evaluate one access request through the gate ladder.
    pub async fn request_zone_access(&self, req: &ZoneAccessRequest) -> AppResult<AccessDecision> {
        let user = req.user_id.as_str();
        let reqs = self.policy.get(req.zone);

        // Gate 1: cooldown. This is the lockout check itself, so a denial
        // here does not increment the counter.
        if self.attempts.in_cooldown(user, reqs) {
            return Ok(self.deny(req, DenialReason::CooldownActive, false));
        }

        // Gate 2: clearance level and credential set
        let Some(status) = self.clearance.snapshot(user) else {
            return Ok(self.deny(req, DenialReason::InsufficientClearance, true));
        };
        if status.expired_at(chrono::Utc::now()) || status.clearance_level < reqs.min_clearance_level {
            return Ok(self.deny(req, DenialReason::InsufficientClearance, true));
        }

        // First proof per category wins; duplicates are ignored
        let mut submitted: BTreeMap<CredentialType, &CredentialProof> = BTreeMap::new();
        for proof in &req.credentials {
            submitted.entry(proof.credential_type()).or_insert(proof);
        }

        for required in &reqs.required_credentials {
            let Some(proof) = submitted.get(required).copied() else {
                tracing::info!(user = %user, zone = %req.zone, credential = ?required, "required credential not submitted");
                return Ok(self.deny(req, DenialReason::MissingCredential, true));
            };
            // Revocation wins even over an also-active listing
            if !status.credential_usable(*required) {
                tracing::info!(user = %user, zone = %req.zone, credential = ?required, "credential revoked or not held");
                return Ok(self.deny(req, DenialReason::InvalidCredential, true));
            }
            match tokio::time::timeout(
                self.verify_timeout,
                self.collab.credentials.verify_credential(user, proof),
            )
            .await
            {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => {
                    return Ok(self.deny(req, DenialReason::InvalidCredential, true));
                }
                Ok(Err(e)) => {
                    // Fail closed on collaborator faults
                    tracing::warn!(user = %user, credential = ?required, error = %e, "credential verifier failed");
                    return Ok(self.deny(req, DenialReason::InvalidCredential, true));
                }
                Err(_) => {
                    tracing::warn!(user = %user, credential = ?required, "credential verifier timed out");
                    return Ok(self.deny(req, DenialReason::InvalidCredential, true));
                }
            }
        }

        // Multi-factor: the submitted set must span at least two categories
        if reqs.mfa_required && submitted.len() < 2 {
            return Ok(self.deny(req, DenialReason::MissingCredential, true));
        }

        // Gate 3: biometric confidence
        let mut biometric_confidence = 1.0;
        if reqs.biometric_required {
            let Some(sample) = &req.biometric_sample else {
                return Ok(self.deny(req, DenialReason::BiometricRequired, true));
            };
            let confidence = match tokio::time::timeout(
                self.verify_timeout,
                self.collab.biometric.verify_biometric(user, sample),
            )
            .await
            {
                Ok(Ok(c)) => c,
                Ok(Err(e)) => {
                    tracing::warn!(user = %user, error = %e, "biometric verifier failed");
                    return Ok(self.deny(req, DenialReason::BiometricFailed, true));
                }
                Err(_) => {
                    tracing::warn!(user = %user, "biometric verifier timed out");
                    return Ok(self.deny(req, DenialReason::BiometricFailed, true));
                }
            };
            if confidence < BIOMETRIC_CONFIDENCE_FLOOR {
                tracing::info!(user = %user, confidence, floor = BIOMETRIC_CONFIDENCE_FLOOR, "biometric below floor");
                return Ok(self.deny(req, DenialReason::BiometricFailed, true));
            }
            biometric_confidence = confidence;
        }

        // Gate 4: AI trust score
        let mut ai_trust_score = 1.0;
        if reqs.ai_verification_required {
            let score = match tokio::time::timeout(
                self.verify_timeout,
                self.collab.trust.compute_trust_score(user),
            )
            .await
            {
                Ok(Ok(s)) => s,
                Ok(Err(e)) => {
                    tracing::warn!(user = %user, error = %e, "trust scorer failed");
                    return Ok(self.deny(req, DenialReason::AiTrustFailed, true));
                }
                Err(_) => {
                    tracing::warn!(user = %user, "trust scorer timed out");
                    return Ok(self.deny(req, DenialReason::AiTrustFailed, true));
                }
            };
            if score < ADMISSION_TRUST_FLOOR {
                tracing::info!(user = %user, score, floor = ADMISSION_TRUST_FLOOR, "trust score below admission floor");
                return Ok(self.deny(req, DenialReason::AiTrustFailed, true));
            }
            ai_trust_score = score;
        }

        // All gates passed
        self.attempts.clear(user);
        let session = self
            .registry
            .create_session(user, req.zone, reqs, biometric_confidence, ai_trust_score)
            .map_err(|e| AppError::seal("seal_error".to_string(), e.to_string()))?;

        if reqs.continuous_monitoring {
            let handle = self.monitor.spawn(&session.session_id, user);
            self.registry.attach_monitor(&session.session_id, handle);
        }

        self.collab.sink.emit(
            SecurityEvent::new(SecurityEventKind::AccessGranted, user)
                .with_session(&session.session_id)
                .with_zone(req.zone),
        );
        tracing::info!(user = %user, zone = %req.zone, session = %session.session_id, "zone access granted");
        Ok(AccessDecision::Granted(session))
    }

    /// Read-only session validity probe.
    pub fn is_session_valid(&self, session_id: &str) -> bool {
        self.registry.is_session_valid(session_id)
    }

    /// Explicit caller-requested termination.
    pub fn terminate_session(&self, session_id: &str) -> Option<ZoneSession> {
        self.registry.terminate_session(session_id, TerminationReason::Manual)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn failure_count(&self, user_id: &str) -> u32 {
        self.attempts.failure_count(user_id)
    }

    fn deny(&self, req: &ZoneAccessRequest, reason: DenialReason, record: bool) -> AccessDecision {
        if record {
            let count = self.attempts.record_failure(&req.user_id);
            tracing::info!(
                user = %req.user_id, zone = %req.zone, reason = reason.code(),
                failures = count, "zone access denied"
            );
        } else {
            tracing::info!(user = %req.user_id, zone = %req.zone, reason = reason.code(), "zone access denied");
        }
        self.collab.sink.emit(
            SecurityEvent::new(SecurityEventKind::AccessDenied, &req.user_id)
                .with_zone(req.zone)
                .with_reason(reason.code()),
        );
        AccessDecision::Denied { reason }
    }
}
