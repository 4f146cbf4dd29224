//! Account-balance debiting engine
//!
//! [`AccountBalances`] owns the full ordered operator set for one account and
//! orchestrates the top-level debit: balances are visited in weight order
//! (highest first, stable on ties) and each eligible operator absorbs as much
//! of the outstanding usage as it can. Operators are request-local; callers
//! must serialize debits against the same account themselves.

pub mod abstract_balance;
pub mod concrete_balance;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::models::account::AccountProfile;
use crate::models::balance::{sort_balances, Balance, BalanceType};
use crate::models::event::{EventCharges, UsageEvent};
use crate::traits::EngineServices;
use crate::ChargingResult;

pub use abstract_balance::AbstractBalance;
pub use concrete_balance::ConcreteBalance;

/// The capability every balance variant implements: "debit N units of usage
/// at time T against event E".
///
/// `Ok(None)` means the balance's own filters rejected the event (skipped,
/// not eligible). `Ok(Some)` with zero consumption means the balance was
/// eligible but could not contribute, which is what arms the Blocker rule.
#[async_trait]
pub trait BalanceOperator: Send + Sync {
    async fn debit_usage(
        &self,
        usage: Decimal,
        start_time: DateTime<Utc>,
        event: &UsageEvent,
    ) -> ChargingResult<Option<EventCharges>>;
}

/// Instantiates the operator for a balance configuration.
///
/// `cncrt_blncs` is the account's concrete-operator list, needed by abstract
/// operators to cascade their monetary cost into. New balance variants are
/// added here, never by extending an existing operator.
pub fn new_balance_operator(
    blnc_cfg: &Balance,
    cncrt_blncs: &[Arc<ConcreteBalance>],
    services: &EngineServices,
    config: &EngineConfig,
) -> ChargingResult<Arc<dyn BalanceOperator>> {
    blnc_cfg.validate()?;
    match blnc_cfg.balance_type {
        BalanceType::Concrete => Ok(Arc::new(ConcreteBalance::new(
            blnc_cfg.clone(),
            services.clone(),
            config.usage_scale,
        ))),
        BalanceType::Abstract => Ok(Arc::new(AbstractBalance::new(
            blnc_cfg.clone(),
            cncrt_blncs.to_vec(),
            services.clone(),
            config.usage_scale,
        ))),
    }
}

/// Ordered, indexed operator set of a single account
///
/// Built from an immutable profile snapshot for the duration of one debit
/// call and discarded afterwards. Not shared across requests.
pub struct AccountBalances {
    /// Balance snapshots in debit priority order.
    blnc_cfgs: Vec<Balance>,
    /// Positions in `blnc_cfgs` indexed by balance type.
    type_idx: HashMap<BalanceType, Vec<usize>>,
    /// Concrete operators, built first so abstract ones can cascade into them.
    cncrt_blncs: Vec<Arc<ConcreteBalance>>,
    /// Operator per balance ID; concrete entries reuse instances from
    /// `cncrt_blncs` rather than constructing twice.
    opers: HashMap<String, Arc<dyn BalanceOperator>>,
}

impl AccountBalances {
    pub fn new(
        profile: &AccountProfile,
        services: EngineServices,
        config: &EngineConfig,
    ) -> ChargingResult<Self> {
        profile.validate()?;

        let mut blnc_cfgs = profile.balances.clone();
        sort_balances(&mut blnc_cfgs);

        let mut type_idx: HashMap<BalanceType, Vec<usize>> = HashMap::new();
        for (i, blnc_cfg) in blnc_cfgs.iter().enumerate() {
            type_idx.entry(blnc_cfg.balance_type).or_default().push(i);
        }

        // concrete operators first, abstract debits need somewhere to draw from
        let mut cncrt_blncs = Vec::new();
        let mut opers: HashMap<String, Arc<dyn BalanceOperator>> = HashMap::new();
        if let Some(idxs) = type_idx.get(&BalanceType::Concrete) {
            for &i in idxs {
                blnc_cfgs[i].validate()?;
                let cncrt = Arc::new(ConcreteBalance::new(
                    blnc_cfgs[i].clone(),
                    services.clone(),
                    config.usage_scale,
                ));
                opers.insert(blnc_cfgs[i].id.clone(), cncrt.clone());
                cncrt_blncs.push(cncrt);
            }
        }

        for blnc_cfg in &blnc_cfgs {
            if blnc_cfg.balance_type == BalanceType::Concrete {
                continue; // already built above
            }
            opers.insert(
                blnc_cfg.id.clone(),
                new_balance_operator(blnc_cfg, &cncrt_blncs, &services, config)?,
            );
        }

        Ok(Self {
            blnc_cfgs,
            type_idx,
            cncrt_blncs,
            opers,
        })
    }

    /// Debits `usage` across the account's balances in priority order.
    ///
    /// Returns success even when the balances could not cover everything;
    /// the shortfall is reported as `unfulfilled`. A Blocker balance that is
    /// eligible but contributes nothing stops the cascade.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn debit_usage(
        &self,
        usage: Decimal,
        start_time: DateTime<Utc>,
        event: &UsageEvent,
    ) -> ChargingResult<EventCharges> {
        let mut ec = EventCharges::new(usage);
        if usage <= Decimal::ZERO {
            ec.unfulfilled = Decimal::ZERO;
            return Ok(ec);
        }

        let mut outstanding = usage;
        for blnc_cfg in &self.blnc_cfgs {
            if outstanding <= Decimal::ZERO {
                break;
            }
            let oper = self
                .opers
                .get(&blnc_cfg.id)
                .ok_or_else(|| {
                    crate::error::ChargingError::Internal(format!(
                        "no operator for balance {}",
                        blnc_cfg.id
                    ))
                })?;
            match oper.debit_usage(outstanding, start_time, event).await? {
                None => {
                    debug!("Balance {} filtered out, skipping", blnc_cfg.id);
                    continue;
                }
                Some(step) => {
                    let consumed = step.consumed;
                    outstanding -= consumed;
                    ec.merge(step);
                    if blnc_cfg.blocker && consumed.is_zero() {
                        // intentional hard cutoff, lower-weight balances are
                        // not allowed to pick up the remainder
                        warn!(
                            "Blocker balance {} could not contribute, halting cascade",
                            blnc_cfg.id
                        );
                        break;
                    }
                }
            }
        }

        ec.unfulfilled = outstanding;
        debug!(
            "Debited {} of {} requested, {} unfulfilled",
            ec.consumed, ec.requested, ec.unfulfilled
        );
        Ok(ec)
    }

    /// Remaining units of a concrete balance after prior debits
    pub fn remaining_units(&self, balance_id: &str) -> Option<Decimal> {
        self.cncrt_blncs
            .iter()
            .find(|cb| cb.id() == balance_id)
            .map(|cb| cb.remaining())
    }

    /// Balance snapshots with post-debit unit values, for flushing back to
    /// the profile store.
    pub fn updated_balances(&self) -> Vec<Balance> {
        self.blnc_cfgs
            .iter()
            .map(|cfg| {
                let mut blnc = cfg.clone();
                if let Some(units) = self.remaining_units(&cfg.id) {
                    blnc.units = units;
                }
                blnc
            })
            .collect()
    }

    /// Positions of the given type in the priority-ordered balance list
    pub fn positions_of(&self, balance_type: BalanceType) -> &[usize] {
        self.type_idx
            .get(&balance_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Balance snapshots in debit priority order
    pub fn ordered_configs(&self) -> &[Balance] {
        &self.blnc_cfgs
    }
}
