//! External verification seams: credential validity, biometric matching and
//! AI trust scoring. Each real subsystem lives outside this service; the
//! traits here are the narrow contracts the coordinator consumes, and the
//! concrete types below are the in-process simulations wired up by the
//! binary and the test suites.

use std::collections::{BTreeSet, HashMap, VecDeque};

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use password_hash::{PasswordHash, SaltString};

use crate::credential::{BiometricSample, CredentialProof};

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Credential-specific validity check for one submitted proof.
    async fn verify_credential(&self, user_id: &str, proof: &CredentialProof) -> Result<bool>;
}

#[async_trait]
pub trait BiometricVerifier: Send + Sync {
    /// Match a captured sample against the user's enrolled template,
    /// returning a confidence in [0,1].
    async fn verify_biometric(&self, user_id: &str, sample: &BiometricSample) -> Result<f64>;
}

#[async_trait]
pub trait TrustScorer: Send + Sync {
    /// Risk-model trust score in [0,1]; consulted at admission and again by
    /// the continuous monitor.
    async fn compute_trust_score(&self, user_id: &str) -> Result<f64>;
}

fn hash_secret(secret: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(secret.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

fn verify_secret(hash: &str, secret: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(secret.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// In-process credential directory: Argon2-hashed BasicId secrets, recorded
/// NDA agreements, issued grant numbers and bound hardware tokens.
#[derive(Default)]
pub struct DirectoryCredentialVerifier {
    basic_secrets: RwLock<HashMap<String, String>>,
    nda_agreements: RwLock<HashMap<String, String>>,
    issued_grants: RwLock<HashMap<String, BTreeSet<String>>>,
    hardware_tokens: RwLock<HashMap<String, (String, String)>>,
}

impl DirectoryCredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enroll_basic_id(&self, user_id: &str, secret: &str) -> Result<()> {
        let phc = hash_secret(secret)?;
        self.basic_secrets.write().insert(user_id.to_string(), phc);
        Ok(())
    }

    pub fn record_nda(&self, user_id: &str, agreement_id: &str) {
        self.nda_agreements.write().insert(user_id.to_string(), agreement_id.to_string());
    }

    pub fn issue_grant(&self, user_id: &str, grant_number: &str) {
        self.issued_grants
            .write()
            .entry(user_id.to_string())
            .or_default()
            .insert(grant_number.to_string());
    }

    pub fn bind_hardware_token(&self, user_id: &str, serial: &str, otp: &str) {
        self.hardware_tokens
            .write()
            .insert(user_id.to_string(), (serial.to_string(), otp.to_string()));
    }
}

#[async_trait]
impl CredentialVerifier for DirectoryCredentialVerifier {
    async fn verify_credential(&self, user_id: &str, proof: &CredentialProof) -> Result<bool> {
        let ok = match proof {
            CredentialProof::BasicId { subject, secret } => {
                subject == user_id
                    && self
                        .basic_secrets
                        .read()
                        .get(user_id)
                        .map(|phc| verify_secret(phc, secret))
                        .unwrap_or(false)
            }
            CredentialProof::Nda { agreement_id, .. } => self
                .nda_agreements
                .read()
                .get(user_id)
                .map(|rec| rec == agreement_id)
                .unwrap_or(false),
            CredentialProof::GovernmentClearance { grant_number, .. }
            | CredentialProof::MilitaryClearance { grant_number, .. }
            | CredentialProof::QuantumClearance { grant_number, .. } => self
                .issued_grants
                .read()
                .get(user_id)
                .map(|set| set.contains(grant_number))
                .unwrap_or(false),
            CredentialProof::HardwareToken { serial, otp } => self
                .hardware_tokens
                .read()
                .get(user_id)
                .map(|(s, o)| s == serial && o == otp)
                .unwrap_or(false),
            // Biometric material goes through the biometric seam, never here
            CredentialProof::Biometric { .. } => false,
        };
        Ok(ok)
    }
}

/// Matches a sample against the enrolled template byte-for-byte and reports
/// the matching ratio as confidence. Unenrolled users score 0.
#[derive(Default)]
pub struct TemplateBiometricVerifier {
    templates: RwLock<HashMap<String, Vec<u8>>>,
}

impl TemplateBiometricVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enroll(&self, user_id: &str, template: Vec<u8>) {
        self.templates.write().insert(user_id.to_string(), template);
    }
}

#[async_trait]
impl BiometricVerifier for TemplateBiometricVerifier {
    async fn verify_biometric(&self, user_id: &str, sample: &BiometricSample) -> Result<f64> {
        let templates = self.templates.read();
        let Some(enrolled) = templates.get(user_id) else { return Ok(0.0) };
        if enrolled.is_empty() || sample.template.is_empty() {
            return Ok(0.0);
        }
        let len = enrolled.len().max(sample.template.len());
        let matching = enrolled
            .iter()
            .zip(sample.template.iter())
            .filter(|(a, b)| a == b)
            .count();
        Ok(matching as f64 / len as f64)
    }
}

/// Constant-score model stand-in.
pub struct StaticTrustScorer {
    pub score: f64,
}

#[async_trait]
impl TrustScorer for StaticTrustScorer {
    async fn compute_trust_score(&self, _user_id: &str) -> Result<f64> {
        Ok(self.score)
    }
}

/// Plays back a scripted score sequence, then a fallback. Lets tests drive
/// the admission score and later monitor polls independently.
pub struct ScriptedTrustScorer {
    scores: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedTrustScorer {
    pub fn new(scores: Vec<f64>, fallback: f64) -> Self {
        Self { scores: Mutex::new(scores.into()), fallback }
    }
}

#[async_trait]
impl TrustScorer for ScriptedTrustScorer {
    async fn compute_trust_score(&self, _user_id: &str) -> Result<f64> {
        Ok(self.scores.lock().pop_front().unwrap_or(self.fallback))
    }
}

/// Stand-in for a trust model that cannot be reached; every call errors.
pub struct UnavailableTrustScorer;

#[async_trait]
impl TrustScorer for UnavailableTrustScorer {
    async fn compute_trust_score(&self, _user_id: &str) -> Result<f64> {
        Err(anyhow!("trust model offline"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn basic_id_secret_verified_against_hash() {
        let dir = DirectoryCredentialVerifier::new();
        dir.enroll_basic_id("frank", "hunter2").unwrap();
        let good = CredentialProof::BasicId { subject: "frank".into(), secret: "hunter2".into() };
        let bad = CredentialProof::BasicId { subject: "frank".into(), secret: "hunter3".into() };
        assert!(dir.verify_credential("frank", &good).await.unwrap());
        assert!(!dir.verify_credential("frank", &bad).await.unwrap());
        // Subject mismatch fails even with the right secret
        assert!(!dir.verify_credential("grace", &good).await.unwrap());
    }

    #[tokio::test]
    async fn grants_and_tokens_checked_by_value() {
        let dir = DirectoryCredentialVerifier::new();
        dir.issue_grant("frank", "GC-100");
        dir.bind_hardware_token("frank", "HT-1", "424242");
        let gc = CredentialProof::GovernmentClearance { grant_number: "GC-100".into(), issuing_agency: "doe".into() };
        let gc_bad = CredentialProof::GovernmentClearance { grant_number: "GC-999".into(), issuing_agency: "doe".into() };
        let ht = CredentialProof::HardwareToken { serial: "HT-1".into(), otp: "424242".into() };
        let ht_bad = CredentialProof::HardwareToken { serial: "HT-1".into(), otp: "000000".into() };
        assert!(dir.verify_credential("frank", &gc).await.unwrap());
        assert!(!dir.verify_credential("frank", &gc_bad).await.unwrap());
        assert!(dir.verify_credential("frank", &ht).await.unwrap());
        assert!(!dir.verify_credential("frank", &ht_bad).await.unwrap());
    }

    #[tokio::test]
    async fn template_match_ratio_is_confidence() {
        let bio = TemplateBiometricVerifier::new();
        bio.enroll("frank", vec![7u8; 100]);
        let mut close = vec![7u8; 100];
        for b in close.iter_mut().take(10) { *b = 0; }
        let sample = BiometricSample { template: close, captured_at: Utc::now() };
        let conf = bio.verify_biometric("frank", &sample).await.unwrap();
        assert!((conf - 0.90).abs() < 1e-9);
        // Unenrolled users always score zero
        let conf = bio.verify_biometric("grace", &sample).await.unwrap();
        assert_eq!(conf, 0.0);
    }

    #[tokio::test]
    async fn scripted_scorer_plays_sequence_then_fallback() {
        let scorer = ScriptedTrustScorer::new(vec![0.99, 0.80], 0.97);
        assert_eq!(scorer.compute_trust_score("x").await.unwrap(), 0.99);
        assert_eq!(scorer.compute_trust_score("x").await.unwrap(), 0.80);
        assert_eq!(scorer.compute_trust_score("x").await.unwrap(), 0.97);
    }
}
