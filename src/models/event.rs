//! Usage events and the structured charge record
//!
//! [`EventCharges`] is the auditable ledger of one debit call: which balance
//! consumed how much, at which unit factor, at what cost, and what was still
//! outstanding after each step.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A usage event to be charged (a call, a data session, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub tenant: String,
    pub id: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
}

impl UsageEvent {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: Uuid::new_v4().to_string(),
            time: Utc::now(),
            payload: HashMap::new(),
        }
    }

    /// Builder-style payload insertion
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// String payload field, if present
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

/// Concrete balance that funded (part of) an abstract charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingEntry {
    pub balance_id: String,
    /// Monetary units drawn from that balance.
    pub units: Decimal,
}

/// One step of the debit cascade, attributed to a single balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeEntry {
    pub balance_id: String,
    /// Unit factor that converted event units into balance units.
    pub factor: Decimal,
    /// Usage consumed, in original event units.
    pub units: Decimal,
    /// Usage consumed, in the balance's internal unit (post rounding/cap).
    pub balance_units: Decimal,
    /// Monetary cost of this step; zero for direct concrete debits.
    pub cost: Decimal,
    /// Event units still outstanding after this step.
    pub remaining: Decimal,
    /// Concrete balances that paid `cost` (abstract cascades only).
    #[serde(default)]
    pub funding: Vec<FundingEntry>,
}

/// Accumulated charge record of one debit call
///
/// Invariants: `consumed + unfulfilled == requested` and the per-entry
/// consumed units sum to `consumed` exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCharges {
    /// Usage originally requested, in event units.
    pub requested: Decimal,
    /// Usage actually accepted across all entries.
    pub consumed: Decimal,
    /// Residual the balances could not cover; non-zero is not an error.
    pub unfulfilled: Decimal,
    pub charges: Vec<ChargeEntry>,
}

impl EventCharges {
    pub fn new(requested: Decimal) -> Self {
        Self {
            requested,
            consumed: Decimal::ZERO,
            unfulfilled: requested,
            charges: Vec::new(),
        }
    }

    /// Folds one cascade step into the accumulated record.
    pub fn merge(&mut self, step: EventCharges) {
        self.consumed += step.consumed;
        self.unfulfilled = self.requested - self.consumed;
        self.charges.extend(step.charges);
    }

    /// Total monetary cost across all entries
    pub fn total_cost(&self) -> Decimal {
        self.charges.iter().map(|c| c.cost).sum()
    }

    pub fn is_fully_charged(&self) -> bool {
        self.unfulfilled.is_zero()
    }
}
