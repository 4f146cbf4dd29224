//! Balance configuration model
//!
//! A balance is the unit of chargeable value inside an account profile:
//! either *concrete* (holds consumable units directly, e.g. money or voice
//! minutes) or *abstract* (holds no units of its own; its usage is priced by
//! the rate service and settled against the concrete balances).

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChargingError;
use crate::models::units;
use crate::ChargingResult;

/// Wire tag of the concrete balance type
pub const TYPE_CONCRETE: &str = "*concrete";
/// Wire tag of the abstract balance type
pub const TYPE_ABSTRACT: &str = "*abstract";

/// Balance variant, closed set extensible through the operator factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceType {
    #[serde(rename = "*concrete")]
    Concrete,
    #[serde(rename = "*abstract")]
    Abstract,
}

impl BalanceType {
    /// Parse a wire tag; unknown tags are a construction-time error
    pub fn from_tag(tag: &str) -> ChargingResult<Self> {
        match tag {
            TYPE_CONCRETE => Ok(BalanceType::Concrete),
            TYPE_ABSTRACT => Ok(BalanceType::Abstract),
            other => Err(ChargingError::UnsupportedBalanceType(other.to_string())),
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            BalanceType::Concrete => TYPE_CONCRETE,
            BalanceType::Abstract => TYPE_ABSTRACT,
        }
    }
}

/// Rounding granularity and pricing for usage matching its filters
///
/// Ordered list on a balance, first filter match wins. Fees are optional: an
/// abstract balance without a recurrent fee gets its price from the rate
/// service instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostIncrement {
    #[serde(default)]
    pub filter_ids: Vec<String>,
    pub increment: Decimal,
    #[serde(default)]
    pub fixed_fee: Option<Decimal>,
    #[serde(default)]
    pub recurrent_fee: Option<Decimal>,
}

/// Multiplier converting an event's native usage unit into the balance's
/// internal unit (e.g. seconds into minutes). First filter match wins;
/// no match means factor 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFactor {
    #[serde(default)]
    pub filter_ids: Vec<String>,
    pub factor: Decimal,
}

/// A single balance configuration inside an account profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub id: String,
    #[serde(default)]
    pub filter_ids: Vec<String>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub blocker: bool,
    pub balance_type: BalanceType,
    #[serde(default)]
    pub opts: HashMap<String, Value>,
    #[serde(default)]
    pub cost_increments: Vec<CostIncrement>,
    #[serde(default)]
    pub attribute_ids: Vec<String>,
    #[serde(default)]
    pub rate_profile_ids: Vec<String>,
    #[serde(default)]
    pub unit_factors: Vec<UnitFactor>,
    /// Remaining value for concrete balances; present but meaningless for
    /// abstract ones.
    #[serde(default)]
    pub units: Decimal,
}

impl Balance {
    /// Validates the pieces the debit algorithm relies on.
    ///
    /// Runs at operator construction so a malformed configuration fails the
    /// request before any balance is touched.
    pub fn validate(&self) -> ChargingResult<()> {
        for ci in &self.cost_increments {
            if ci.increment <= Decimal::ZERO {
                return Err(ChargingError::InvalidCostIncrement {
                    balance_id: self.id.clone(),
                    reason: format!("non-positive increment {}", ci.increment),
                });
            }
        }
        for uf in &self.unit_factors {
            if uf.factor <= Decimal::ZERO {
                return Err(ChargingError::InvalidUnitFactor {
                    balance_id: self.id.clone(),
                    reason: format!("non-positive factor {}", uf.factor),
                });
            }
        }
        Ok(())
    }
}

/// Sorts balances by weight descending, keeping the declared order on ties.
pub fn sort_balances(balances: &mut [Balance]) {
    balances.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ==================== External (float-facing) representation ====================

/// External balance representation, float units on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiBalance {
    pub id: String,
    #[serde(default)]
    pub filter_ids: Vec<String>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub blocker: bool,
    pub balance_type: String,
    #[serde(default)]
    pub opts: HashMap<String, Value>,
    #[serde(default)]
    pub cost_increments: Vec<ApiCostIncrement>,
    #[serde(default)]
    pub attribute_ids: Vec<String>,
    #[serde(default)]
    pub rate_profile_ids: Vec<String>,
    #[serde(default)]
    pub unit_factors: Vec<ApiUnitFactor>,
    #[serde(default)]
    pub units: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCostIncrement {
    #[serde(default)]
    pub filter_ids: Vec<String>,
    pub increment: f64,
    #[serde(default)]
    pub fixed_fee: Option<f64>,
    #[serde(default)]
    pub recurrent_fee: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUnitFactor {
    #[serde(default)]
    pub filter_ids: Vec<String>,
    pub factor: f64,
}

impl TryFrom<ApiCostIncrement> for CostIncrement {
    type Error = ChargingError;

    fn try_from(api: ApiCostIncrement) -> ChargingResult<Self> {
        Ok(CostIncrement {
            filter_ids: api.filter_ids,
            increment: units::units_from_f64(api.increment)?,
            fixed_fee: api.fixed_fee.map(units::units_from_f64).transpose()?,
            recurrent_fee: api.recurrent_fee.map(units::units_from_f64).transpose()?,
        })
    }
}

impl TryFrom<ApiUnitFactor> for UnitFactor {
    type Error = ChargingError;

    fn try_from(api: ApiUnitFactor) -> ChargingResult<Self> {
        Ok(UnitFactor {
            filter_ids: api.filter_ids,
            factor: units::units_from_f64(api.factor)?,
        })
    }
}

impl TryFrom<ApiBalance> for Balance {
    type Error = ChargingError;

    fn try_from(api: ApiBalance) -> ChargingResult<Self> {
        Ok(Balance {
            balance_type: BalanceType::from_tag(&api.balance_type)?,
            id: api.id,
            filter_ids: api.filter_ids,
            weight: api.weight,
            blocker: api.blocker,
            opts: api.opts,
            cost_increments: api
                .cost_increments
                .into_iter()
                .map(CostIncrement::try_from)
                .collect::<ChargingResult<Vec<_>>>()?,
            attribute_ids: api.attribute_ids,
            rate_profile_ids: api.rate_profile_ids,
            unit_factors: api
                .unit_factors
                .into_iter()
                .map(UnitFactor::try_from)
                .collect::<ChargingResult<Vec<_>>>()?,
            units: units::units_from_f64(api.units)?,
        })
    }
}

impl From<&Balance> for ApiBalance {
    fn from(b: &Balance) -> Self {
        ApiBalance {
            id: b.id.clone(),
            filter_ids: b.filter_ids.clone(),
            weight: b.weight,
            blocker: b.blocker,
            balance_type: b.balance_type.as_tag().to_string(),
            opts: b.opts.clone(),
            cost_increments: b
                .cost_increments
                .iter()
                .map(|ci| ApiCostIncrement {
                    filter_ids: ci.filter_ids.clone(),
                    increment: units::units_to_f64(ci.increment).unwrap_or_default(),
                    fixed_fee: ci.fixed_fee.and_then(|f| units::units_to_f64(f).ok()),
                    recurrent_fee: ci.recurrent_fee.and_then(|f| units::units_to_f64(f).ok()),
                })
                .collect(),
            attribute_ids: b.attribute_ids.clone(),
            rate_profile_ids: b.rate_profile_ids.clone(),
            unit_factors: b
                .unit_factors
                .iter()
                .map(|uf| ApiUnitFactor {
                    filter_ids: uf.filter_ids.clone(),
                    factor: units::units_to_f64(uf.factor).unwrap_or_default(),
                })
                .collect(),
            units: units::units_to_f64(b.units).unwrap_or_default(),
        }
    }
}
