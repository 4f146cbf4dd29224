// src/models/mod.rs
pub mod account;
pub mod balance;
pub mod event;
pub mod units;

pub use account::{AccountProfile, ActivationInterval, ApiAccountProfile};
pub use balance::{
    ApiBalance, ApiCostIncrement, ApiUnitFactor, Balance, BalanceType, CostIncrement, UnitFactor,
};
pub use event::{ChargeEntry, EventCharges, FundingEntry, UsageEvent};
