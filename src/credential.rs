//! Typed credential proofs. Each credential category carries its own proof
//! schema rather than an untyped blob, so the verifier seam can match on the
//! variant it understands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::CredentialType;

/// A raw biometric capture submitted alongside an access request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricSample {
    /// Opaque feature vector produced by the capture device.
    pub template: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

/// Proof submitted for one credential category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialProof {
    BasicId { subject: String, secret: String },
    Nda { agreement_id: String, signed_at: DateTime<Utc> },
    GovernmentClearance { grant_number: String, issuing_agency: String },
    MilitaryClearance { grant_number: String, branch: String },
    QuantumClearance { grant_number: String, lab_id: String },
    Biometric { sample: BiometricSample },
    HardwareToken { serial: String, otp: String },
}

impl CredentialProof {
    pub fn credential_type(&self) -> CredentialType {
        match self {
            CredentialProof::BasicId { .. } => CredentialType::BasicId,
            CredentialProof::Nda { .. } => CredentialType::Nda,
            CredentialProof::GovernmentClearance { .. } => CredentialType::GovernmentClearance,
            CredentialProof::MilitaryClearance { .. } => CredentialType::MilitaryClearance,
            CredentialProof::QuantumClearance { .. } => CredentialType::QuantumClearance,
            CredentialProof::Biometric { .. } => CredentialType::Biometric,
            CredentialProof::HardwareToken { .. } => CredentialType::HardwareToken,
        }
    }
}
