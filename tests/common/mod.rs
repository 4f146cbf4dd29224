//! Deterministic fakes for the external collaborators, plus profile builders.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use ocs_accounts::models::{
    AccountProfile, Balance, BalanceType, CostIncrement, UnitFactor, UsageEvent,
};
use ocs_accounts::traits::{
    AttributeService, CostSchedule, EngineServices, FilterService, RateService,
};
use ocs_accounts::{ChargingError, ChargingResult};

/// Filter fake: empty lists always match; otherwise every referenced filter
/// must be in the `matching` set. IDs in `failing` simulate a broken filter
/// service.
#[derive(Default)]
pub struct StubFilterService {
    pub matching: HashSet<String>,
    pub failing: HashSet<String>,
    /// When set, any call carrying a different tenant is an error.
    pub required_tenant: Option<String>,
}

impl StubFilterService {
    pub fn matching_all() -> Self {
        Self::default()
    }

    pub fn with_matching(ids: &[&str]) -> Self {
        Self {
            matching: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn requiring_tenant(tenant: &str) -> Self {
        Self {
            required_tenant: Some(tenant.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl FilterService for StubFilterService {
    async fn matches(
        &self,
        tenant: &str,
        filter_ids: &[String],
        _event: &UsageEvent,
    ) -> ChargingResult<bool> {
        if let Some(required) = &self.required_tenant {
            if tenant != required {
                return Err(ChargingError::FilterService(format!(
                    "unexpected tenant <{}>",
                    tenant
                )));
            }
        }
        for id in filter_ids {
            if self.failing.contains(id) {
                return Err(ChargingError::FilterService(format!(
                    "filter {} unavailable",
                    id
                )));
            }
        }
        // vacuously true for empty filter lists
        Ok(filter_ids.iter().all(|id| self.matching.contains(id)))
    }
}

/// Filter fake keyed on the event payload: a filter id of the form
/// `Key:Value` matches when the event carries that field. Empty lists match.
pub struct FieldFilterService;

#[async_trait]
impl FilterService for FieldFilterService {
    async fn matches(
        &self,
        _tenant: &str,
        filter_ids: &[String],
        event: &UsageEvent,
    ) -> ChargingResult<bool> {
        Ok(filter_ids.iter().all(|id| match id.split_once(':') {
            Some((key, value)) => event.field_str(key) == Some(value),
            None => false,
        }))
    }
}

/// Attribute fake: injects fixed fields into the event payload.
#[derive(Default)]
pub struct StubAttributeService {
    pub inject: Vec<(String, Value)>,
    pub fail: bool,
}

#[async_trait]
impl AttributeService for StubAttributeService {
    async fn resolve(
        &self,
        _tenant: &str,
        attribute_ids: &[String],
        event: &UsageEvent,
    ) -> ChargingResult<UsageEvent> {
        if self.fail {
            return Err(ChargingError::AttributeService(format!(
                "attributes {:?} unavailable",
                attribute_ids
            )));
        }
        let mut enriched = event.clone();
        for (key, value) in &self.inject {
            enriched.payload.insert(key.clone(), value.clone());
        }
        Ok(enriched)
    }
}

/// Rate fake: one flat schedule for everything.
pub struct StubRateService {
    pub rate_per_unit: Decimal,
    pub connection_fee: Decimal,
    pub fail: bool,
}

impl StubRateService {
    pub fn flat(rate_per_unit: Decimal) -> Self {
        Self {
            rate_per_unit,
            connection_fee: Decimal::ZERO,
            fail: false,
        }
    }
}

#[async_trait]
impl RateService for StubRateService {
    async fn rate(
        &self,
        _tenant: &str,
        rate_profile_ids: &[String],
        _event: &UsageEvent,
        _usage: Decimal,
    ) -> ChargingResult<CostSchedule> {
        if self.fail {
            return Err(ChargingError::RateService(format!(
                "rate profiles {:?} unavailable",
                rate_profile_ids
            )));
        }
        Ok(CostSchedule {
            rate_per_unit: self.rate_per_unit,
            connection_fee: self.connection_fee,
        })
    }
}

pub fn services(
    filters: StubFilterService,
    attributes: StubAttributeService,
    rates: StubRateService,
) -> EngineServices {
    EngineServices::new(Arc::new(filters), Arc::new(attributes), Arc::new(rates))
}

/// Services whose filter evaluation keys on event payload fields.
pub fn field_keyed_services(
    attributes: StubAttributeService,
    rates: StubRateService,
) -> EngineServices {
    EngineServices::new(Arc::new(FieldFilterService), Arc::new(attributes), Arc::new(rates))
}

/// Services where every filter matches, attributes are pass-through and
/// rating is never reached.
pub fn permissive_services() -> EngineServices {
    services(
        StubFilterService::matching_all(),
        StubAttributeService::default(),
        StubRateService::flat(Decimal::ZERO),
    )
}

pub fn concrete_balance(id: &str, weight: f64, units: Decimal, increment: Decimal) -> Balance {
    Balance {
        id: id.to_string(),
        filter_ids: vec![],
        weight,
        blocker: false,
        balance_type: BalanceType::Concrete,
        opts: HashMap::new(),
        cost_increments: vec![CostIncrement {
            filter_ids: vec![],
            increment,
            fixed_fee: None,
            recurrent_fee: None,
        }],
        attribute_ids: vec![],
        rate_profile_ids: vec![],
        unit_factors: vec![],
        units,
    }
}

pub fn abstract_balance(id: &str, weight: f64, increment: Decimal) -> Balance {
    Balance {
        id: id.to_string(),
        filter_ids: vec![],
        weight,
        blocker: false,
        balance_type: BalanceType::Abstract,
        opts: HashMap::new(),
        cost_increments: vec![CostIncrement {
            filter_ids: vec![],
            increment,
            fixed_fee: None,
            recurrent_fee: None,
        }],
        attribute_ids: vec![],
        rate_profile_ids: vec!["RP_ANY".to_string()],
        unit_factors: vec![],
        units: Decimal::ZERO,
    }
}

pub fn with_unit_factor(mut balance: Balance, factor: Decimal) -> Balance {
    balance.unit_factors = vec![UnitFactor {
        filter_ids: vec![],
        factor,
    }];
    balance
}

pub fn profile(tenant: &str, id: &str, balances: Vec<Balance>) -> AccountProfile {
    AccountProfile {
        tenant: tenant.to_string(),
        id: id.to_string(),
        filter_ids: vec![],
        activation_interval: None,
        weight: 20.0,
        opts: HashMap::new(),
        balances,
        threshold_ids: vec![],
    }
}

pub fn event(tenant: &str) -> UsageEvent {
    UsageEvent::new(tenant).with_field("Account", "1001")
}
