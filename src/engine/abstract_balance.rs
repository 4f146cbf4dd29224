//! Abstract balance operator
//!
//! Holds no units of its own: it prices usage (through its cost increments or
//! the external rate service) and settles the resulting monetary cost against
//! the account's concrete balances, in the same weight order the account
//! itself uses. If the concrete balances cannot fund the full cost, only the
//! proportionally covered usage counts as charged.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::balance::Balance;
use crate::models::event::{ChargeEntry, EventCharges, FundingEntry, UsageEvent};
use crate::models::units;
use crate::traits::EngineServices;
use crate::ChargingResult;

use super::concrete_balance::{match_cost_increment, match_unit_factor, ConcreteBalance};
use super::BalanceOperator;

pub struct AbstractBalance {
    blnc_cfg: Balance,
    /// Concrete operators of the same account, in debit priority order.
    /// Shared back-reference for cascading, not an ownership cycle.
    cncrt_blncs: Vec<Arc<ConcreteBalance>>,
    services: EngineServices,
    scale: u32,
}

impl AbstractBalance {
    pub fn new(
        blnc_cfg: Balance,
        cncrt_blncs: Vec<Arc<ConcreteBalance>>,
        services: EngineServices,
        scale: u32,
    ) -> Self {
        Self {
            blnc_cfg,
            cncrt_blncs,
            services,
            scale,
        }
    }

    pub fn id(&self) -> &str {
        &self.blnc_cfg.id
    }

    /// Draws `cost` monetary units from the concrete balances, walking them
    /// in priority order. Returns the covered amount and the funding trail.
    async fn cascade_cost(
        &self,
        cost: Decimal,
        start_time: DateTime<Utc>,
        event: &UsageEvent,
    ) -> ChargingResult<(Decimal, Vec<FundingEntry>)> {
        let mut remaining = cost;
        let mut funding = Vec::new();
        for cncrt in &self.cncrt_blncs {
            if remaining <= Decimal::ZERO {
                break;
            }
            match cncrt.debit_usage(remaining, start_time, event).await? {
                None => continue,
                Some(step) => {
                    for entry in &step.charges {
                        funding.push(FundingEntry {
                            balance_id: entry.balance_id.clone(),
                            units: entry.units,
                        });
                    }
                    let paid = step.consumed;
                    remaining -= paid;
                    if cncrt.is_blocker() && paid.is_zero() {
                        break;
                    }
                }
            }
        }
        Ok((cost - remaining, funding))
    }
}

#[async_trait]
impl BalanceOperator for AbstractBalance {
    async fn debit_usage(
        &self,
        usage: Decimal,
        start_time: DateTime<Utc>,
        event: &UsageEvent,
    ) -> ChargingResult<Option<EventCharges>> {
        // 1. eligibility
        if !self
            .services
            .filters
            .matches(&event.tenant, &self.blnc_cfg.filter_ids, event)
            .await?
        {
            return Ok(None);
        }

        let mut ec = EventCharges::new(usage);

        // 2. attribute enrichment; increment and factor selection below must
        // see the enriched event, a filter may key on an injected field
        let rated_event = if self.blnc_cfg.attribute_ids.is_empty() {
            event.clone()
        } else {
            self.services
                .attributes
                .resolve(&event.tenant, &self.blnc_cfg.attribute_ids, event)
                .await?
        };

        let cost_incrm =
            match match_cost_increment(&self.services, &self.blnc_cfg, &rated_event).await? {
                Some(ci) => ci.clone(),
                None => {
                    debug!(
                        "Abstract balance {} has no matching cost increment for event {}",
                        self.blnc_cfg.id, event.id
                    );
                    return Ok(Some(ec));
                }
            };

        // 3. usage in this balance's unit, truncated to whole increments
        let factor = match_unit_factor(&self.services, &self.blnc_cfg, &rated_event).await?;
        let blnc_usage = units::mul_units(usage, factor)?;
        let rounded = units::round_units_to_increment(blnc_usage, cost_incrm.increment)?;
        if rounded.is_zero() {
            return Ok(Some(ec));
        }
        let increments = units::whole_increments(rounded, cost_incrm.increment)?;

        // 4. price: recurrent fee per increment when configured, the rate
        // service otherwise; the fixed fee applies once per cascade entry
        let fixed_fee = cost_incrm.fixed_fee.unwrap_or(Decimal::ZERO);
        let cost = match cost_incrm.recurrent_fee {
            Some(recurrent_fee) => fixed_fee + units::mul_units(recurrent_fee, increments)?,
            None => {
                let schedule = self
                    .services
                    .rates
                    .rate(
                        &rated_event.tenant,
                        &self.blnc_cfg.rate_profile_ids,
                        &rated_event,
                        rounded,
                    )
                    .await?;
                fixed_fee + schedule.cost_for(rounded)?
            }
        };

        // 5. settle the cost against the concrete balances
        let (covered, funding) = if cost.is_zero() {
            (Decimal::ZERO, Vec::new())
        } else {
            self.cascade_cost(cost, start_time, &rated_event).await?
        };

        // only the funded share of the usage counts as charged
        let charged_units = if cost.is_zero() || covered == cost {
            rounded
        } else {
            units::div_units(units::mul_units(rounded, covered)?, cost, self.scale)?
        };
        if charged_units.is_zero() {
            debug!(
                "Abstract balance {} found no funding for event {} (cost {})",
                self.blnc_cfg.id, event.id, cost
            );
            return Ok(Some(ec));
        }

        // 6. record usage consumed and cost paid
        let consumed = units::div_units(charged_units, factor, self.scale)?;
        ec.consumed = consumed;
        ec.unfulfilled = usage - consumed;
        ec.charges.push(ChargeEntry {
            balance_id: self.blnc_cfg.id.clone(),
            factor,
            units: consumed,
            balance_units: charged_units,
            cost: covered,
            remaining: usage - consumed,
            funding,
        });

        debug!(
            "Abstract balance {} charged {} event units at cost {}",
            self.blnc_cfg.id, consumed, covered
        );
        Ok(Some(ec))
    }
}
