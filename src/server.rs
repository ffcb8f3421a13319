//!
//! zonegate HTTP server
//! --------------------
//! This module defines the Axum-based HTTP API over the zone access core.
//!
//! Responsibilities:
//! - Wiring the coordinator, session registry and collaborator simulations.
//! - Access request, session validity and termination endpoints.
//! - Policy introspection endpoint for the four-zone ladder.
//! - Background sweeper for expired session records.
//! - First-run demo clearance seeding and startup inventory logs.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde_json::json;
use tracing::info;

use crate::access::{AccessDecision, Collaborators, ContinuousMonitor, SessionRegistry, ZoneAccessCoordinator, ZoneAccessRequest};
use crate::clearance::{ClearanceStatus, ClearanceStore};
use crate::error::AppError;
use crate::events::TracingEventSink;
use crate::policy::{CredentialType, DEFAULT_POLICY};
use crate::sealer::HybridSealer;
use crate::verify::{DirectoryCredentialVerifier, StaticTrustScorer, TemplateBiometricVerifier};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ZoneAccessCoordinator>,
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}

/// Start the zonegate HTTP server on the configured port.
pub async fn run() -> anyhow::Result<()> {
    let port = env_u64("ZONEGATE_HTTP_PORT", 7878) as u16;
    run_with_port(port).await
}

pub async fn run_with_port(http_port: u16) -> anyhow::Result<()> {
    let clearance = Arc::new(ClearanceStore::new());
    let directory = Arc::new(DirectoryCredentialVerifier::new());
    let biometric = Arc::new(TemplateBiometricVerifier::new());
    seed_demo_clearances(&clearance, &directory, &biometric)?;

    let sink = Arc::new(TracingEventSink);
    let sealer = Arc::new(HybridSealer::generate().map_err(|e| anyhow::anyhow!(e.to_string()))?);
    let registry = Arc::new(SessionRegistry::new(sealer, sink.clone()));

    let verify_timeout = Duration::from_millis(env_u64("ZONEGATE_VERIFY_TIMEOUT_MS", 3000));
    let coordinator = Arc::new(ZoneAccessCoordinator::new(
        DEFAULT_POLICY.clone(),
        clearance.clone(),
        registry.clone(),
        Collaborators {
            credentials: directory,
            biometric,
            trust: Arc::new(StaticTrustScorer { score: 0.99 }),
            sink,
        },
        ContinuousMonitor::default_interval(),
        verify_timeout,
    ));

    // Background sweeper for expired session records
    {
        // Interval in seconds; default 60s; set to 0 to disable
        let sweep_secs = env_u64("ZONEGATE_SWEEP_INTERVAL_SECS", 60);
        if sweep_secs > 0 {
            let registry_for_sweep = registry.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(sweep_secs)).await;
                    let removed = registry_for_sweep.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed = removed, "session_sweep");
                    }
                }
            });
        } else {
            tracing::info!("session sweeper disabled");
        }
    }

    let app_state = AppState { coordinator };

    let app = Router::new()
        .route("/", get(|| async { "zonegate ok" }))
        .route("/access/request", post(request_access))
        .route("/session/{id}/valid", get(session_valid))
        .route("/session/{id}/terminate", post(terminate_session))
        .route("/policy/zones", get(policy_zones))
        .with_state(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting zonegate on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Seed a small demo directory so the service is explorable out of the box:
/// a visitor (Public), an analyst (Restricted) and a director cleared for
/// every zone with an enrolled biometric template and a bound hardware token.
fn seed_demo_clearances(
    clearance: &ClearanceStore,
    directory: &DirectoryCredentialVerifier,
    biometric: &TemplateBiometricVerifier,
) -> anyhow::Result<()> {
    use CredentialType::*;

    clearance.upsert("visitor", ClearanceStatus::new(0, &[BasicId]));
    directory.enroll_basic_id("visitor", "lobby")?;

    clearance.upsert("analyst", ClearanceStatus::new(1, &[BasicId, Nda]));
    directory.enroll_basic_id("analyst", "mezzanine")?;
    directory.record_nda("analyst", "NDA-2044");

    clearance.upsert(
        "director",
        ClearanceStatus::new(3, &[
            BasicId, Nda, GovernmentClearance, MilitaryClearance, QuantumClearance, HardwareToken,
        ]),
    );
    directory.enroll_basic_id("director", "vault")?;
    directory.record_nda("director", "NDA-0001");
    directory.issue_grant("director", "GC-77");
    directory.issue_grant("director", "MC-12");
    directory.issue_grant("director", "QC-03");
    directory.bind_hardware_token("director", "HT-900", "424242");
    biometric.enroll("director", vec![0xA5; 64]);

    info!("Seeded demo clearances: visitor (public), analyst (restricted), director (all zones)");
    Ok(())
}

fn error_response(err: AppError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err)).into_response()
}

async fn request_access(
    State(state): State<AppState>,
    Json(req): Json<ZoneAccessRequest>,
) -> Response {
    match state.coordinator.request_zone_access(&req).await {
        Ok(AccessDecision::Granted(session)) => {
            let token = session.sealed_token.encode();
            (
                StatusCode::OK,
                Json(json!({
                    "granted": true,
                    "session": {
                        "session_id": session.session_id,
                        "user_id": session.user_id,
                        "zone": session.zone.name(),
                        "started_at": session.started_at,
                        "expires_at": session.expires_at,
                        "biometric_confidence": session.biometric_confidence,
                        "ai_trust_score": session.ai_trust_score,
                        "monitored": session.monitored,
                        "token": token,
                    },
                })),
            )
                .into_response()
        }
        Ok(AccessDecision::Denied { reason }) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "granted": false, "reason": reason.code() })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn session_valid(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let valid = state.coordinator.is_session_valid(&id);
    (StatusCode::OK, Json(json!({ "session_id": id, "valid": valid }))).into_response()
}

async fn terminate_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.coordinator.terminate_session(&id) {
        Some(session) => (
            StatusCode::OK,
            Json(json!({ "terminated": true, "session_id": session.session_id, "user_id": session.user_id })),
        )
            .into_response(),
        None => error_response(AppError::not_found("session_not_found", "no such session")),
    }
}

async fn policy_zones(State(state): State<AppState>) -> Response {
    let zones: Vec<_> = state
        .coordinator
        .policy()
        .iter()
        .map(|(zone, reqs)| json!({ "zone": zone.name(), "requirements": reqs }))
        .collect();
    (StatusCode::OK, Json(json!({ "zones": zones }))).into_response()
}
