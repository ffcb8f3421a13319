//! Zone policy ladder: the static, validated mapping from security zone to
//! the credentials, verification factors and session limits that zone demands.
//!
//! The four zones form a strictly escalating ladder. `ZonePolicyTable::new`
//! rejects any table where a stricter zone relaxes a field relative to a less
//! strict one, so the rest of the core can assume monotonicity.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Minimum biometric match confidence accepted at admission.
pub const BIOMETRIC_CONFIDENCE_FLOOR: f64 = 0.95;
/// Minimum AI trust score accepted at admission.
pub const ADMISSION_TRUST_FLOOR: f64 = 0.98;
/// Minimum AI trust score tolerated by the continuous monitor.
pub const MONITOR_TRUST_FLOOR: f64 = 0.95;

/// One tier of the four-level access ladder. Ordering follows strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityZone {
    Public,
    Restricted,
    Classified,
    UltraClassified,
}

impl SecurityZone {
    pub const ALL: [SecurityZone; 4] = [
        SecurityZone::Public,
        SecurityZone::Restricted,
        SecurityZone::Classified,
        SecurityZone::UltraClassified,
    ];

    /// Numeric clearance level required to even be considered for this zone.
    pub fn clearance_level(self) -> u8 {
        match self {
            SecurityZone::Public => 0,
            SecurityZone::Restricted => 1,
            SecurityZone::Classified => 2,
            SecurityZone::UltraClassified => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SecurityZone::Public => "public",
            SecurityZone::Restricted => "restricted",
            SecurityZone::Classified => "classified",
            SecurityZone::UltraClassified => "ultra_classified",
        }
    }
}

impl Display for SecurityZone {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityZone {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(SecurityZone::Public),
            "restricted" => Ok(SecurityZone::Restricted),
            "classified" => Ok(SecurityZone::Classified),
            "ultra_classified" | "ultraclassified" => Ok(SecurityZone::UltraClassified),
            other => Err(anyhow!("unknown security zone '{}'", other)),
        }
    }
}

/// Typed proof-of-eligibility categories required by one or more zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    BasicId,
    Nda,
    GovernmentClearance,
    MilitaryClearance,
    QuantumClearance,
    Biometric,
    HardwareToken,
}

/// Static per-zone admission requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneAccessRequirements {
    pub min_clearance_level: u8,
    pub required_credentials: BTreeSet<CredentialType>,
    pub mfa_required: bool,
    pub biometric_required: bool,
    pub ai_verification_required: bool,
    pub continuous_monitoring: bool,
    pub session_timeout_secs: u64,
    pub max_failed_attempts: u32,
    pub cooldown_secs: u64,
}

/// Immutable zone -> requirements mapping, ladder-validated at construction.
#[derive(Debug, Clone)]
pub struct ZonePolicyTable {
    zones: BTreeMap<SecurityZone, ZoneAccessRequirements>,
}

fn creds(list: &[CredentialType]) -> BTreeSet<CredentialType> {
    list.iter().copied().collect()
}

impl ZonePolicyTable {
    /// Construct a table from an explicit mapping, rejecting incomplete or
    /// non-monotonic ladders.
    pub fn new(zones: BTreeMap<SecurityZone, ZoneAccessRequirements>) -> Result<Self> {
        for z in SecurityZone::ALL {
            if !zones.contains_key(&z) {
                return Err(anyhow!("policy table missing zone '{}'", z));
            }
        }
        let table = Self { zones };
        table.validate_ladder()?;
        Ok(table)
    }

    /// The built-in production ladder.
    pub fn builtin() -> Self {
        use CredentialType::*;
        let mut zones = BTreeMap::new();
        zones.insert(SecurityZone::Public, ZoneAccessRequirements {
            min_clearance_level: 0,
            required_credentials: creds(&[BasicId]),
            mfa_required: false,
            biometric_required: false,
            ai_verification_required: false,
            continuous_monitoring: false,
            session_timeout_secs: 3600,
            max_failed_attempts: 5,
            cooldown_secs: 60,
        });
        zones.insert(SecurityZone::Restricted, ZoneAccessRequirements {
            min_clearance_level: 1,
            required_credentials: creds(&[BasicId, Nda]),
            mfa_required: true,
            biometric_required: false,
            ai_verification_required: false,
            continuous_monitoring: false,
            session_timeout_secs: 1800,
            max_failed_attempts: 3,
            cooldown_secs: 300,
        });
        zones.insert(SecurityZone::Classified, ZoneAccessRequirements {
            min_clearance_level: 2,
            required_credentials: creds(&[BasicId, Nda, GovernmentClearance]),
            mfa_required: true,
            biometric_required: true,
            ai_verification_required: true,
            continuous_monitoring: true,
            session_timeout_secs: 900,
            max_failed_attempts: 3,
            cooldown_secs: 600,
        });
        zones.insert(SecurityZone::UltraClassified, ZoneAccessRequirements {
            min_clearance_level: 3,
            required_credentials: creds(&[
                BasicId, Nda, GovernmentClearance, MilitaryClearance, QuantumClearance, HardwareToken,
            ]),
            mfa_required: true,
            biometric_required: true,
            ai_verification_required: true,
            continuous_monitoring: true,
            session_timeout_secs: 300,
            max_failed_attempts: 2,
            cooldown_secs: 900,
        });
        // The builtin ladder is monotone by construction; new() re-checks it.
        Self::new(zones).expect("builtin policy ladder must validate")
    }

    pub fn get(&self, zone: SecurityZone) -> &ZoneAccessRequirements {
        // Every constructor guarantees all four zones are present.
        &self.zones[&zone]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SecurityZone, &ZoneAccessRequirements)> {
        self.zones.iter().map(|(z, r)| (*z, r))
    }

    /// Stricter zones never relax any field relative to a less strict zone.
    fn validate_ladder(&self) -> Result<()> {
        for pair in SecurityZone::ALL.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            let a = &self.zones[&lo];
            let b = &self.zones[&hi];
            if b.min_clearance_level < a.min_clearance_level {
                return Err(anyhow!("ladder violation: {} lowers min_clearance_level below {}", hi, lo));
            }
            if !b.required_credentials.is_superset(&a.required_credentials) {
                return Err(anyhow!("ladder violation: {} drops credentials required by {}", hi, lo));
            }
            if b.session_timeout_secs > a.session_timeout_secs {
                return Err(anyhow!("ladder violation: {} lengthens session_timeout_secs over {}", hi, lo));
            }
            if b.max_failed_attempts > a.max_failed_attempts {
                return Err(anyhow!("ladder violation: {} raises max_failed_attempts over {}", hi, lo));
            }
            if b.cooldown_secs < a.cooldown_secs {
                return Err(anyhow!("ladder violation: {} shortens cooldown_secs below {}", hi, lo));
            }
            for (flag, a_set, b_set) in [
                ("mfa_required", a.mfa_required, b.mfa_required),
                ("biometric_required", a.biometric_required, b.biometric_required),
                ("ai_verification_required", a.ai_verification_required, b.ai_verification_required),
                ("continuous_monitoring", a.continuous_monitoring, b.continuous_monitoring),
            ] {
                if a_set && !b_set {
                    return Err(anyhow!("ladder violation: {} clears {} set by {}", hi, flag, lo));
                }
            }
        }
        Ok(())
    }
}

impl Default for ZonePolicyTable {
    fn default() -> Self { Self::builtin() }
}

/// Process-default ladder shared by components that take no explicit table.
pub static DEFAULT_POLICY: Lazy<ZonePolicyTable> = Lazy::new(ZonePolicyTable::builtin);
