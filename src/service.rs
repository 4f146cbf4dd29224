//! Charging service facade
//!
//! The single operation the core exposes upward: load the account profile,
//! build a request-local operator set, debit, flush the post-debit units back
//! to the store. Callers must serialize debits against the same account; the
//! operator set itself is never shared between requests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::engine::AccountBalances;
use crate::error::ChargingError;
use crate::models::account::AccountProfile;
use crate::models::balance::{Balance, BalanceType};
use crate::models::event::{EventCharges, UsageEvent};
use crate::traits::{EngineServices, ProfileStore};
use crate::ChargingResult;

pub struct ChargingService {
    store: Arc<dyn ProfileStore>,
    services: EngineServices,
    config: EngineConfig,
}

impl ChargingService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        services: EngineServices,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            services,
            config,
        }
    }

    /// Debits usage against a stored account and flushes the updated units.
    ///
    /// A failed external call aborts the cascade, but decrements applied
    /// before the failure are still flushed: a failed call means "partially
    /// applied, reconcile with a read", never "rolled back".
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn debit_account_usage(
        &self,
        tenant: &str,
        account_id: &str,
        usage: Decimal,
        start_time: DateTime<Utc>,
        event: &UsageEvent,
    ) -> ChargingResult<EventCharges> {
        // events without a tenant charge under the configured default
        let defaulted;
        let event = if event.tenant.is_empty() {
            defaulted = UsageEvent {
                tenant: self.config.default_tenant.clone(),
                ..event.clone()
            };
            &defaulted
        } else {
            event
        };

        let profile = self.store.load(tenant, account_id).await?;
        let result = self.debit_profile_usage(&profile, usage, start_time, event).await;

        let (outcome, balances) = match result {
            Ok((ec, balances)) => (Ok(ec), balances),
            // partial decrements stay applied on error
            Err((err, balances)) => (Err(err), balances),
        };

        let units: Vec<(String, Decimal)> = balances
            .iter()
            .filter(|b| b.balance_type == BalanceType::Concrete)
            .map(|b| (b.id.clone(), b.units))
            .collect();
        if !units.is_empty() {
            if let Err(flush_err) = self
                .store
                .update_balance_units(tenant, account_id, &units)
                .await
            {
                warn!(
                    "Failed to flush balance units for {}:{}: {}",
                    tenant, account_id, flush_err
                );
                // the debit failure, when there was one, is the primary error
                return match outcome {
                    Ok(_) => Err(flush_err),
                    Err(err) => Err(err),
                };
            }
        }

        match outcome {
            Ok(ec) => {
                info!(
                    "Debited account {}:{} consumed={} unfulfilled={}",
                    tenant, account_id, ec.consumed, ec.unfulfilled
                );
                Ok(ec)
            }
            Err(err) => {
                warn!(
                    "Debit aborted for account {}:{}, partial charges flushed: {}",
                    tenant, account_id, err
                );
                Err(err)
            }
        }
    }

    /// Debits usage against an already-loaded profile snapshot.
    ///
    /// Returns the charge record together with the post-debit balance
    /// snapshots so the caller can persist them. On error the snapshots
    /// reflect whatever was decremented before the failure.
    pub async fn debit_profile_usage(
        &self,
        profile: &AccountProfile,
        usage: Decimal,
        start_time: DateTime<Utc>,
        event: &UsageEvent,
    ) -> Result<(EventCharges, Vec<Balance>), (ChargingError, Vec<Balance>)> {
        if !profile.is_active_at(start_time) {
            return Err((
                ChargingError::ProfileNotActive(profile.tenant_id()),
                profile.balances.clone(),
            ));
        }
        // profile-level eligibility: an account whose filters reject the
        // event does not charge it
        match self
            .services
            .filters
            .matches(&profile.tenant, &profile.filter_ids, event)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return Err((
                    ChargingError::ProfileNotFound(profile.tenant_id()),
                    profile.balances.clone(),
                ))
            }
            Err(err) => return Err((err, profile.balances.clone())),
        }

        let acnt_blncs =
            match AccountBalances::new(profile, self.services.clone(), &self.config) {
                Ok(ab) => ab,
                Err(err) => return Err((err, profile.balances.clone())),
            };
        match acnt_blncs.debit_usage(usage, start_time, event).await {
            Ok(ec) => Ok((ec, acnt_blncs.updated_balances())),
            Err(err) => Err((err, acnt_blncs.updated_balances())),
        }
    }
}
