//! Contracts of the external collaborators
//!
//! The engine never evaluates filter expressions, resolves attributes or
//! computes rates itself; those are injected services behind these traits.
//! Tests substitute deterministic fakes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::models::account::AccountProfile;
use crate::models::event::UsageEvent;
use crate::models::units;
use crate::ChargingResult;

/// Cost schedule returned by the rate service for a usage quantity
#[derive(Debug, Clone, PartialEq)]
pub struct CostSchedule {
    /// Price per internal usage unit.
    pub rate_per_unit: Decimal,
    /// One-time fee applied once per rated step.
    pub connection_fee: Decimal,
}

impl CostSchedule {
    /// Total cost of `usage` units under this schedule
    pub fn cost_for(&self, usage: Decimal) -> ChargingResult<Decimal> {
        Ok(self.connection_fee + units::mul_units(self.rate_per_unit, usage)?)
    }
}

/// Evaluates filter expressions against an event.
///
/// An empty filter list always matches.
#[async_trait]
pub trait FilterService: Send + Sync {
    async fn matches(
        &self,
        tenant: &str,
        filter_ids: &[String],
        event: &UsageEvent,
    ) -> ChargingResult<bool>;
}

/// Rewrites or enriches an event before rating (e.g. injects a destination).
#[async_trait]
pub trait AttributeService: Send + Sync {
    async fn resolve(
        &self,
        tenant: &str,
        attribute_ids: &[String],
        event: &UsageEvent,
    ) -> ChargingResult<UsageEvent>;
}

/// Prices abstract usage through rate profiles.
#[async_trait]
pub trait RateService: Send + Sync {
    async fn rate(
        &self,
        tenant: &str,
        rate_profile_ids: &[String],
        event: &UsageEvent,
        usage: Decimal,
    ) -> ChargingResult<CostSchedule>;
}

/// Loads account profiles for charging.
///
/// Mutation of profiles is the store collaborator's concern; the engine only
/// reads a snapshot per request and hands back updated units for flushing.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, tenant: &str, id: &str) -> ChargingResult<AccountProfile>;

    /// Flushes post-debit unit values back to the stored profile.
    async fn update_balance_units(
        &self,
        tenant: &str,
        id: &str,
        units: &[(String, Decimal)],
    ) -> ChargingResult<()>;
}

/// Bundle of service handles passed down to operator construction
#[derive(Clone)]
pub struct EngineServices {
    pub filters: Arc<dyn FilterService>,
    pub attributes: Arc<dyn AttributeService>,
    pub rates: Arc<dyn RateService>,
}

impl EngineServices {
    pub fn new(
        filters: Arc<dyn FilterService>,
        attributes: Arc<dyn AttributeService>,
        rates: Arc<dyn RateService>,
    ) -> Self {
        Self {
            filters,
            attributes,
            rates,
        }
    }
}
