//! Continuous re-verification. Each monitored session gets its own periodic
//! task that re-scores trust and force-terminates on expiry, low trust, or
//! any fault reaching the scorer. Failures are contained here; nothing this
//! task does can propagate an error into the coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::access::session::{SessionRegistry, TerminationReason};
use crate::policy::MONITOR_TRUST_FLOOR;
use crate::verify::TrustScorer;

#[derive(Clone)]
pub struct ContinuousMonitor {
    registry: Arc<SessionRegistry>,
    scorer: Arc<dyn TrustScorer>,
    interval: Duration,
    verify_timeout: Duration,
}

impl ContinuousMonitor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        scorer: Arc<dyn TrustScorer>,
        interval: Duration,
        verify_timeout: Duration,
    ) -> Self {
        Self { registry, scorer, interval, verify_timeout }
    }

    /// Monitoring interval: 30s unless overridden via environment.
    pub fn default_interval() -> Duration {
        let secs: u64 = std::env::var("ZONEGATE_MONITOR_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        Duration::from_secs(secs.max(1))
    }

    /// Start the per-session task. The returned handle must be attached to
    /// the session entry so termination can abort it.
    pub fn spawn(&self, session_id: &str, user_id: &str) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let scorer = self.scorer.clone();
        let interval = self.interval;
        let verify_timeout = self.verify_timeout;
        let sid = session_id.to_string();
        let user = user_id.to_string();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval() fires immediately; swallow the first tick so the
            // session gets one full interval before its first re-check
            ticker.tick().await;
            loop {
                ticker.tick().await;

                if !registry.is_session_valid(&sid) {
                    registry.terminate_session(&sid, TerminationReason::Expired);
                    break;
                }

                let score = match tokio::time::timeout(verify_timeout, scorer.compute_trust_score(&user)).await {
                    Ok(Ok(score)) => score,
                    Ok(Err(e)) => {
                        // Fail closed: an unreachable scorer ends the session
                        tracing::warn!(user = %user, session = %sid, error = %e, "trust re-check failed, terminating");
                        registry.terminate_session(&sid, TerminationReason::SuspiciousActivity);
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(user = %user, session = %sid, "trust re-check timed out, terminating");
                        registry.terminate_session(&sid, TerminationReason::SuspiciousActivity);
                        break;
                    }
                };

                if score < MONITOR_TRUST_FLOOR {
                    tracing::warn!(
                        user = %user, session = %sid, score = score,
                        floor = MONITOR_TRUST_FLOOR, "trust dropped below monitoring floor"
                    );
                    registry.terminate_session(&sid, TerminationReason::SuspiciousActivity);
                    break;
                }
                tracing::debug!(user = %user, session = %sid, score = score, "trust re-check passed");
            }
        })
    }
}
