//! Real-time usage-charging core for telecom/ISP billing
//!
//! Given a usage event for an account, the engine atomically consumes value
//! from the account's ordered balances: it walks them by weight, applies
//! unit-factor conversions and truncating increment rounding, settles
//! abstract (priced) balances against concrete ones, and emits a structured
//! [`models::EventCharges`] ledger of exactly what was charged.
//!
//! All money and usage arithmetic is exact decimal; filter evaluation,
//! attribute resolution and rating are injected external services (see
//! [`traits`]). Requests against the same account must be serialized by the
//! caller; the engine builds a fresh, request-local operator set per call.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod traits;

pub use config::EngineConfig;
pub use engine::{AccountBalances, BalanceOperator};
pub use error::ChargingError;
pub use models::{AccountProfile, Balance, BalanceType, EventCharges, UsageEvent};
pub use service::ChargingService;
pub use traits::{AttributeService, CostSchedule, EngineServices, FilterService, ProfileStore, RateService};

/// Result type alias using ChargingError
pub type ChargingResult<T> = Result<T, ChargingError>;
