//! Account profile model
//!
//! A profile is a tenant-scoped, named collection of balance configurations.
//! The balances are kept in declaration order; debit priority is derived at
//! load time by a stable sort on weight, so equal weights keep the order the
//! profile declared them in.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChargingError;
use crate::models::balance::{sort_balances, ApiBalance, Balance};
use crate::ChargingResult;

/// Time window in which a profile may charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationInterval {
    pub activation_time: DateTime<Utc>,
    #[serde(default)]
    pub expiry_time: Option<DateTime<Utc>>,
}

impl ActivationInterval {
    pub fn is_active_at(&self, t: DateTime<Utc>) -> bool {
        if t < self.activation_time {
            return false;
        }
        match self.expiry_time {
            Some(expiry) => t < expiry,
            None => true,
        }
    }
}

/// Account profile, identity `Tenant:ID`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub tenant: String,
    pub id: String,
    #[serde(default)]
    pub filter_ids: Vec<String>,
    #[serde(default)]
    pub activation_interval: Option<ActivationInterval>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub opts: HashMap<String, Value>,
    /// Balances in declaration order; IDs are unique within the profile.
    #[serde(default)]
    pub balances: Vec<Balance>,
    #[serde(default)]
    pub threshold_ids: Vec<String>,
}

impl AccountProfile {
    /// Combined identity, e.g. `cgrates.org:1001`
    pub fn tenant_id(&self) -> String {
        format!("{}:{}", self.tenant, self.id)
    }

    /// Looks a balance up by its ID
    pub fn balance(&self, id: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.id == id)
    }

    /// Rejects duplicate balance IDs; run on every ingest path.
    pub fn validate(&self) -> ChargingResult<()> {
        let mut seen = std::collections::HashSet::new();
        for blc in &self.balances {
            if !seen.insert(blc.id.as_str()) {
                return Err(ChargingError::InvalidProfile(format!(
                    "duplicate balance id {} in profile {}",
                    blc.id,
                    self.tenant_id()
                )));
            }
        }
        Ok(())
    }

    /// Balances in debit priority order (weight descending, stable ties)
    pub fn ordered_balances(&self) -> Vec<Balance> {
        let mut blncs = self.balances.clone();
        sort_balances(&mut blncs);
        blncs
    }

    /// Whether the profile may charge at `t`
    pub fn is_active_at(&self, t: DateTime<Utc>) -> bool {
        self.activation_interval
            .as_ref()
            .map(|ai| ai.is_active_at(t))
            .unwrap_or(true)
    }
}

/// Sorts profiles by weight descending, stable on ties.
pub fn sort_profiles(profiles: &mut [AccountProfile]) {
    profiles.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ==================== External (float-facing) representation ====================

/// External account profile, float balance units on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAccountProfile {
    pub tenant: String,
    pub id: String,
    #[serde(default)]
    pub filter_ids: Vec<String>,
    #[serde(default)]
    pub activation_interval: Option<ActivationInterval>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub opts: HashMap<String, Value>,
    #[serde(default)]
    pub balances: Vec<ApiBalance>,
    #[serde(default)]
    pub threshold_ids: Vec<String>,
}

impl TryFrom<ApiAccountProfile> for AccountProfile {
    type Error = ChargingError;

    fn try_from(api: ApiAccountProfile) -> ChargingResult<Self> {
        let profile = AccountProfile {
            tenant: api.tenant,
            id: api.id,
            filter_ids: api.filter_ids,
            activation_interval: api.activation_interval,
            weight: api.weight,
            opts: api.opts,
            balances: api
                .balances
                .into_iter()
                .map(Balance::try_from)
                .collect::<ChargingResult<Vec<_>>>()?,
            threshold_ids: api.threshold_ids,
        };
        profile.validate()?;
        Ok(profile)
    }
}
