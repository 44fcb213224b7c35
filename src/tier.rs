//! Identity resolution: `token -> tier policy`.
//!
//! The store mapping tokens to subscription levels belongs to an external
//! collaborator. This module defines the lookup contract the rest of the crate
//! consumes ([`TierResolver`]) and a read-only in-memory implementation that
//! can be filled from a JSON identity file.

use std::{collections::HashMap, fmt, path::Path, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::FareguardError;

/// Flight numbers are three digits, so one call can never hand out more.
pub const MAX_DENSITY_PER_REQUEST: u32 = 900;

/// Subscription level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Entry level.
    Free,
    /// Mid level.
    Plus,
    /// Top level.
    Pro,
}

impl Tier {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Plus => "plus",
            Tier::Pro => "pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "plus" => Ok(Tier::Plus),
            "pro" => Ok(Tier::Pro),
            _ => Err(()),
        }
    }
}

#[derive(Deserialize)]
struct RawTierPolicy {
    limit_per_window: u64,
    density_per_request: u32,
}

/// Admission limit per window and records synthesized per admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierPolicy {
    limit_per_window: u64,
    density_per_request: u32,
}

impl TierPolicy {
    /// Validated policy.
    ///
    /// `limit_per_window` must be at least 1 and `density_per_request` must be
    /// in `1..=900`.
    pub fn new(limit_per_window: u64, density_per_request: u32) -> Result<Self, FareguardError> {
        if limit_per_window == 0 {
            return Err(FareguardError::InvalidTierPolicy(
                "Limit per window must be at least 1".to_string(),
            ));
        }

        if density_per_request == 0 || density_per_request > MAX_DENSITY_PER_REQUEST {
            return Err(FareguardError::InvalidTierPolicy(format!(
                "Density per request must be between 1 and {MAX_DENSITY_PER_REQUEST}"
            )));
        }

        Ok(Self {
            limit_per_window,
            density_per_request,
        })
    }

    /// Admissions allowed per window.
    pub fn limit_per_window(&self) -> u64 {
        self.limit_per_window
    }

    /// Records synthesized per admitted request.
    pub fn density_per_request(&self) -> u32 {
        self.density_per_request
    }
}

impl<'de> Deserialize<'de> for TierPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawTierPolicy::deserialize(deserializer)?;
        Self::new(raw.limit_per_window, raw.density_per_request).map_err(serde::de::Error::custom)
    }
}

/// Policy for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    /// Policy for [`Tier::Free`].
    pub free: TierPolicy,
    /// Policy for [`Tier::Plus`].
    pub plus: TierPolicy,
    /// Policy for [`Tier::Pro`].
    pub pro: TierPolicy,
}

impl TierTable {
    /// Policy for `tier`.
    pub fn policy(&self, tier: Tier) -> TierPolicy {
        match tier {
            Tier::Free => self.free,
            Tier::Plus => self.plus,
            Tier::Pro => self.pro,
        }
    }
}

impl Default for TierTable {
    /// 5/15/30 requests per window, 1/2/3 records per request.
    fn default() -> Self {
        Self {
            free: TierPolicy {
                limit_per_window: 5,
                density_per_request: 1,
            },
            plus: TierPolicy {
                limit_per_window: 15,
                density_per_request: 2,
            },
            pro: TierPolicy {
                limit_per_window: 30,
                density_per_request: 3,
            },
        }
    }
}

/// A resolved caller. Read-only from this crate's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque bearer token.
    pub token: String,
    /// Subscription level.
    pub tier: Tier,
    /// Policy derived from the tier.
    pub policy: TierPolicy,
}

impl Identity {
    /// Admissions allowed per window.
    pub fn limit_per_window(&self) -> u64 {
        self.policy.limit_per_window()
    }

    /// Records synthesized per admitted request.
    pub fn density_per_request(&self) -> u32 {
        self.policy.density_per_request()
    }
}

/// Lookup contract for the identity store.
///
/// Implementations must be free of side effects. A missing mapping and a
/// malformed one are both reported as `None`.
pub trait TierResolver: Send + Sync {
    /// Resolves `token`, or `None` for an unknown identity.
    fn lookup(&self, token: &str) -> Option<Identity>;
}

/// One entry of an identity file. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityRecord {
    /// Bearer token.
    pub token: String,
    /// Tier name; anything unrecognised is treated as `free`.
    #[serde(default)]
    pub permission_level: String,
}

/// Read-only token table held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTierResolver {
    tiers: TierTable,
    identities: HashMap<String, Tier>,
    order: Vec<String>,
}

impl MemoryTierResolver {
    /// Empty resolver using `tiers` for policy lookup.
    pub fn new(tiers: TierTable) -> Self {
        Self {
            tiers,
            identities: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Adds or replaces `token`.
    pub fn with_identity(mut self, token: impl Into<String>, tier: Tier) -> Self {
        self.insert(token.into(), tier);
        self
    }

    fn insert(&mut self, token: String, tier: Tier) {
        if self.identities.insert(token.clone(), tier).is_none() {
            self.order.push(token);
        }
    }

    /// Builds a resolver from identity records, preserving file order.
    pub fn from_records(tiers: TierTable, records: Vec<IdentityRecord>) -> Self {
        let mut resolver = Self::new(tiers);
        for record in records {
            if record.token.is_empty() {
                continue;
            }

            let tier = record.permission_level.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    token = %crate::mask_token(&record.token),
                    level = %record.permission_level,
                    "unrecognised permission level, using free"
                );
                Tier::Free
            });
            resolver.insert(record.token, tier);
        }
        resolver
    }

    /// Parses a JSON array of identity records.
    pub fn from_json_str(tiers: TierTable, json: &str) -> Result<Self, FareguardError> {
        let records: Vec<IdentityRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(tiers, records))
    }

    /// Reads a JSON identity file.
    pub fn from_path(tiers: TierTable, path: impl AsRef<Path>) -> Result<Self, FareguardError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(tiers, &json)
    }

    /// Tokens in insertion order.
    pub fn tokens(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of known identities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// `true` when no identity is known.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl TierResolver for MemoryTierResolver {
    fn lookup(&self, token: &str) -> Option<Identity> {
        let tier = *self.identities.get(token)?;
        Some(Identity {
            token: token.to_string(),
            tier,
            policy: self.tiers.policy(tier),
        })
    }
}
