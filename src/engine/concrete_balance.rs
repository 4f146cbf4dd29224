//! Concrete balance operator
//!
//! Debits directly against its own stored units. Besides serving account-level
//! usage, concrete operators are the settlement targets of abstract cascades,
//! which re-enter here with monetary cost reinterpreted as usage.

use std::cmp;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ChargingError;
use crate::models::balance::{Balance, CostIncrement};
use crate::models::event::{ChargeEntry, EventCharges, UsageEvent};
use crate::models::units;
use crate::traits::EngineServices;
use crate::ChargingResult;

use super::BalanceOperator;

pub struct ConcreteBalance {
    blnc_cfg: Balance,
    /// Remaining units; request-local interior mutability, the lock is never
    /// held across an await point.
    units: Mutex<Decimal>,
    services: EngineServices,
    scale: u32,
}

impl ConcreteBalance {
    pub fn new(blnc_cfg: Balance, services: EngineServices, scale: u32) -> Self {
        let units = Mutex::new(blnc_cfg.units);
        Self {
            blnc_cfg,
            units,
            services,
            scale,
        }
    }

    pub fn id(&self) -> &str {
        &self.blnc_cfg.id
    }

    pub fn config(&self) -> &Balance {
        &self.blnc_cfg
    }

    pub fn is_blocker(&self) -> bool {
        self.blnc_cfg.blocker
    }

    /// Units still available on this balance
    pub fn remaining(&self) -> Decimal {
        self.units.lock().map(|u| *u).unwrap_or(self.blnc_cfg.units)
    }

    fn lock_units(&self) -> ChargingResult<std::sync::MutexGuard<'_, Decimal>> {
        self.units
            .lock()
            .map_err(|_| ChargingError::Internal(format!("poisoned units lock on {}", self.blnc_cfg.id)))
    }
}

/// First cost increment whose filters match the event
pub(super) async fn match_cost_increment<'a>(
    services: &EngineServices,
    blnc_cfg: &'a Balance,
    event: &UsageEvent,
) -> ChargingResult<Option<&'a CostIncrement>> {
    for cost_incrm in &blnc_cfg.cost_increments {
        if services
            .filters
            .matches(&event.tenant, &cost_incrm.filter_ids, event)
            .await?
        {
            return Ok(Some(cost_incrm));
        }
    }
    Ok(None)
}

/// First unit factor whose filters match the event; no match means factor 1
pub(super) async fn match_unit_factor(
    services: &EngineServices,
    blnc_cfg: &Balance,
    event: &UsageEvent,
) -> ChargingResult<Decimal> {
    for unit_factor in &blnc_cfg.unit_factors {
        if services
            .filters
            .matches(&event.tenant, &unit_factor.filter_ids, event)
            .await?
        {
            return Ok(unit_factor.factor);
        }
    }
    Ok(Decimal::ONE)
}

#[async_trait]
impl BalanceOperator for ConcreteBalance {
    async fn debit_usage(
        &self,
        usage: Decimal,
        start_time: DateTime<Utc>,
        event: &UsageEvent,
    ) -> ChargingResult<Option<EventCharges>> {
        // 1. eligibility: the balance's own filters
        if !self
            .services
            .filters
            .matches(&event.tenant, &self.blnc_cfg.filter_ids, event)
            .await?
        {
            return Ok(None);
        }

        let mut ec = EventCharges::new(usage);

        // 2. first matching cost increment; without one the balance cannot charge
        let cost_incrm = match match_cost_increment(&self.services, &self.blnc_cfg, event).await? {
            Some(ci) => ci.clone(),
            None => {
                debug!(
                    "Balance {} has no matching cost increment for event {}",
                    self.blnc_cfg.id, event.id
                );
                return Ok(Some(ec));
            }
        };

        // 3. convert the requested usage into this balance's unit
        let factor = match_unit_factor(&self.services, &self.blnc_cfg, event).await?;
        let blnc_usage = units::mul_units(usage, factor)?;

        // 4. truncate to whole increments; fractions are deferred, never charged
        let rounded = units::round_units_to_increment(blnc_usage, cost_incrm.increment)?;

        // 5+6. cap at the available units and decrement; a balance that cannot
        // cover even one increment contributes nothing
        let debited = {
            let mut available = self.lock_units()?;
            if *available < cost_incrm.increment || rounded.is_zero() {
                Decimal::ZERO
            } else {
                let debited = cmp::min(rounded, *available);
                *available -= debited;
                debited
            }
        };
        if debited.is_zero() {
            debug!(
                "Balance {} exhausted for event {} at {}",
                self.blnc_cfg.id, event.id, start_time
            );
            return Ok(Some(ec));
        }

        // 7. report in original event units via the inverse factor
        let consumed = units::div_units(debited, factor, self.scale)?;
        ec.consumed = consumed;
        ec.unfulfilled = usage - consumed;
        ec.charges.push(ChargeEntry {
            balance_id: self.blnc_cfg.id.clone(),
            factor,
            units: consumed,
            balance_units: debited,
            cost: Decimal::ZERO, // concrete debits consume value directly, no price
            remaining: usage - consumed,
            funding: Vec::new(),
        });

        debug!(
            "Balance {} debited {} internal units ({} event units), {} left",
            self.blnc_cfg.id,
            debited,
            consumed,
            self.remaining()
        );
        Ok(Some(ec))
    }
}
