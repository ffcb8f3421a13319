//! Clearance snapshots: the per-user authorization level and credential sets
//! the coordinator reads at admission time. Enrollment and revocation happen
//! outside the access core; this store only has to expose a consistent
//! read surface plus the write entry points that outer surface uses.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::policy::CredentialType;

/// Current clearance standing for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearanceStatus {
    pub clearance_level: u8,
    pub active_credentials: BTreeSet<CredentialType>,
    pub revoked_credentials: BTreeSet<CredentialType>,
    pub last_verified: DateTime<Utc>,
    pub expiration_date: Option<DateTime<Utc>>,
    /// Admission-time trust scores recorded by the enrollment surface.
    #[serde(default)]
    pub trust_history: Vec<f64>,
}

impl ClearanceStatus {
    pub fn new(clearance_level: u8, active: &[CredentialType]) -> Self {
        Self {
            clearance_level,
            active_credentials: active.iter().copied().collect(),
            revoked_credentials: BTreeSet::new(),
            last_verified: Utc::now(),
            expiration_date: None,
            trust_history: Vec::new(),
        }
    }

    /// A credential satisfies a requirement only while active and not revoked.
    /// Revocation wins even over a lingering active listing.
    pub fn credential_usable(&self, cred: CredentialType) -> bool {
        self.active_credentials.contains(&cred) && !self.revoked_credentials.contains(&cred)
    }

    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.map(|d| now >= d).unwrap_or(false)
    }
}

/// User id -> clearance snapshot map. Reads take a cheap clone of the
/// snapshot so in-flight requests observe a stable view while a revocation
/// commits; a revocation fully committed before the read is always observed.
#[derive(Debug, Default)]
pub struct ClearanceStore {
    users: RwLock<HashMap<String, ClearanceStatus>>,
}

impl ClearanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, user_id: &str) -> Option<ClearanceStatus> {
        self.users.read().get(user_id).cloned()
    }

    pub fn upsert(&self, user_id: &str, status: ClearanceStatus) {
        self.users.write().insert(user_id.to_string(), status);
    }

    /// Move a credential to the revoked set. Keeps the sets disjoint.
    pub fn revoke_credential(&self, user_id: &str, cred: CredentialType) -> bool {
        let mut users = self.users.write();
        match users.get_mut(user_id) {
            Some(st) => {
                st.active_credentials.remove(&cred);
                st.revoked_credentials.insert(cred);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, user_id: &str) -> bool {
        self.users.write().remove(user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}
