//! Sealed session tokens: encrypt-then-sign on seal, verify-then-decrypt on
//! open. The strategy is fixed at startup through the `Sealer` trait; the
//! byte layout of a sealed token is opaque to the rest of the core.

use aws_lc_rs::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey, NONCE_LEN};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::policy::SecurityZone;

/// Plaintext minted into every session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub user_id: String,
    pub zone: SecurityZone,
    pub issued_at: DateTime<Utc>,
    pub nonce: [u8; 16],
}

impl TokenPayload {
    pub fn mint(user_id: &str, zone: SecurityZone) -> Self {
        let mut nonce = [0u8; 16];
        let _ = getrandom::getrandom(&mut nonce);
        Self { user_id: user_id.to_string(), zone, issued_at: Utc::now(), nonce }
    }
}

/// Opaque ciphertext + detached signature. Only the sealing strategy that
/// produced a token can interpret these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedToken {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SealedToken {
    /// Base64url transport encoding for HTTP responses.
    pub fn encode(&self) -> String {
        let bytes = bincode::serialize(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Self, SealError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| SealError::Decode(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| SealError::Decode(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("key generation failed: {0}")]
    Keygen(String),
    #[error("payload encoding failed: {0}")]
    Encode(String),
    #[error("cipher failure")]
    Cipher,
    #[error("signature invalid")]
    BadSignature,
    #[error("payload decoding failed: {0}")]
    Decode(String),
}

/// Strategy seam for the encrypt-then-sign pipeline. Resolved once at startup
/// and injected; never chosen per call.
pub trait Sealer: Send + Sync {
    fn seal(&self, payload: &TokenPayload) -> Result<SealedToken, SealError>;
    fn open(&self, token: &SealedToken) -> Result<TokenPayload, SealError>;
}

/// AES-256-GCM encryption followed by an Ed25519 signature over
/// nonce || ciphertext. Both keys are generated fresh at construction, so
/// sealed tokens do not survive a process restart.
pub struct HybridSealer {
    cipher: LessSafeKey,
    signing: SigningKey,
    verifying: VerifyingKey,
}

impl HybridSealer {
    pub fn generate() -> Result<Self, SealError> {
        let mut cipher_key = [0u8; 32];
        getrandom::getrandom(&mut cipher_key).map_err(|e| SealError::Keygen(e.to_string()))?;
        let unbound = UnboundKey::new(&AES_256_GCM, &cipher_key).map_err(|_| SealError::Keygen("aead key rejected".into()))?;

        let mut sig_seed = [0u8; 32];
        getrandom::getrandom(&mut sig_seed).map_err(|e| SealError::Keygen(e.to_string()))?;
        let signing = SigningKey::from_bytes(&sig_seed);
        let verifying = signing.verifying_key();

        Ok(Self { cipher: LessSafeKey::new(unbound), signing, verifying })
    }
}

impl Sealer for HybridSealer {
    fn seal(&self, payload: &TokenPayload) -> Result<SealedToken, SealError> {
        let plaintext = bincode::serialize(payload).map_err(|e| SealError::Encode(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).map_err(|e| SealError::Keygen(e.to_string()))?;

        let mut in_out = plaintext;
        self.cipher
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| SealError::Cipher)?;

        // Sign nonce || ciphertext so neither can be swapped independently
        let mut msg = Vec::with_capacity(NONCE_LEN + in_out.len());
        msg.extend_from_slice(&nonce);
        msg.extend_from_slice(&in_out);
        let signature = self.signing.sign(&msg);

        Ok(SealedToken { nonce, ciphertext: in_out, signature: signature.to_bytes().to_vec() })
    }

    fn open(&self, token: &SealedToken) -> Result<TokenPayload, SealError> {
        let sig_bytes: &[u8; 64] =
            token.signature.as_slice().try_into().map_err(|_| SealError::BadSignature)?;
        let signature = Signature::from_bytes(sig_bytes);

        let mut msg = Vec::with_capacity(NONCE_LEN + token.ciphertext.len());
        msg.extend_from_slice(&token.nonce);
        msg.extend_from_slice(&token.ciphertext);
        self.verifying.verify(&msg, &signature).map_err(|_| SealError::BadSignature)?;

        let mut in_out = token.ciphertext.clone();
        let plaintext = self
            .cipher
            .open_in_place(Nonce::assume_unique_for_key(token.nonce), Aad::empty(), &mut in_out)
            .map_err(|_| SealError::Cipher)?;

        bincode::deserialize(plaintext).map_err(|e| SealError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let sealer = HybridSealer::generate().unwrap();
        let payload = TokenPayload::mint("erin", SecurityZone::Classified);
        let sealed = sealer.seal(&payload).unwrap();
        let opened = sealer.open(&sealed).unwrap();
        assert_eq!(opened, payload);
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let sealer = HybridSealer::generate().unwrap();
        let mut sealed = sealer.seal(&TokenPayload::mint("erin", SecurityZone::Public)).unwrap();
        // Flipping a ciphertext bit invalidates the signature first
        sealed.ciphertext[0] ^= 0x01;
        assert!(matches!(sealer.open(&sealed), Err(SealError::BadSignature)));
    }

    #[test]
    fn foreign_signature_rejected() {
        let sealer = HybridSealer::generate().unwrap();
        let other = HybridSealer::generate().unwrap();
        let sealed = sealer.seal(&TokenPayload::mint("erin", SecurityZone::Public)).unwrap();
        assert!(matches!(other.open(&sealed), Err(SealError::BadSignature)));
    }

    #[test]
    fn transport_encoding_round_trips() {
        let sealer = HybridSealer::generate().unwrap();
        let sealed = sealer.seal(&TokenPayload::mint("erin", SecurityZone::Restricted)).unwrap();
        let decoded = SealedToken::decode(&sealed.encode()).unwrap();
        assert_eq!(decoded, sealed);
        assert!(SealedToken::decode("not-a-token").is_err());
    }

    #[test]
    fn nonces_are_unique_per_seal() {
        let sealer = HybridSealer::generate().unwrap();
        let payload = TokenPayload::mint("erin", SecurityZone::Public);
        let a = sealer.seal(&payload).unwrap();
        let b = sealer.seal(&payload).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
