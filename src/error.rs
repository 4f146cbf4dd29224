//! Unified error handling for the charging core
//!
//! Every fallible path in the engine returns [`ChargingError`]. Configuration
//! problems surface at operator construction, before any balance is touched;
//! external-service failures abort the in-flight debit call. Insufficient
//! funds is deliberately *not* an error: a partial debit returns success with
//! a non-zero unfulfilled residual.

use thiserror::Error;

/// Main error type of the charging core
#[derive(Error, Debug)]
pub enum ChargingError {
    // ==================== Configuration errors ====================
    // Raised while building the operator set, never mid-debit.
    #[error("Unsupported balance type: <{0}>")]
    UnsupportedBalanceType(String),

    #[error("Invalid cost increment on balance {balance_id}: {reason}")]
    InvalidCostIncrement { balance_id: String, reason: String },

    #[error("Invalid unit factor on balance {balance_id}: {reason}")]
    InvalidUnitFactor { balance_id: String, reason: String },

    #[error("Invalid balance units: {0}")]
    InvalidUnits(String),

    #[error("Invalid account profile: {0}")]
    InvalidProfile(String),

    // ==================== Profile errors ====================
    #[error("Account profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Account profile not active: {0}")]
    ProfileNotActive(String),

    // ==================== External service errors ====================
    // Aborting the call leaves earlier decrements of the same cascade
    // applied; callers must reconcile with a follow-up read.
    #[error("Filter service error: {0}")]
    FilterService(String),

    #[error("Attribute service error: {0}")]
    AttributeService(String),

    #[error("Rate service error: {0}")]
    RateService(String),

    #[error("Profile store error: {0}")]
    Store(String),

    // ==================== Arithmetic errors ====================
    #[error("Numeric error: {0}")]
    Numeric(String),

    // ==================== Internal errors ====================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChargingError {
    /// Returns the stable machine-readable code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ChargingError::UnsupportedBalanceType(_) => "unsupported_balance_type",
            ChargingError::InvalidCostIncrement { .. } => "invalid_cost_increment",
            ChargingError::InvalidUnitFactor { .. } => "invalid_unit_factor",
            ChargingError::InvalidUnits(_) => "invalid_units",
            ChargingError::InvalidProfile(_) => "invalid_profile",
            ChargingError::ProfileNotFound(_) => "profile_not_found",
            ChargingError::ProfileNotActive(_) => "profile_not_active",
            ChargingError::FilterService(_) => "filter_service_error",
            ChargingError::AttributeService(_) => "attribute_service_error",
            ChargingError::RateService(_) => "rate_service_error",
            ChargingError::Store(_) => "store_error",
            ChargingError::Numeric(_) => "numeric_error",
            ChargingError::Internal(_) => "internal_error",
        }
    }

    /// True when the failure happened in an external collaborator
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            ChargingError::FilterService(_)
                | ChargingError::AttributeService(_)
                | ChargingError::RateService(_)
                | ChargingError::Store(_)
        )
    }
}
