// src/config.rs
use std::env;

use crate::error::ChargingError;

/// Default decimal places kept when a division cannot terminate
/// (inverse unit-factor conversions, proportional funding splits).
const DEFAULT_USAGE_SCALE: u32 = 10;

/// Default tenant applied to events that carry none.
const DEFAULT_TENANT: &str = "ocs.local";

/// Engine-wide configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Scale (decimal places) applied to non-terminating divisions.
    pub usage_scale: u32,
    /// Tenant used when a request does not specify one.
    pub default_tenant: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            usage_scale: DEFAULT_USAGE_SCALE,
            default_tenant: DEFAULT_TENANT.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ChargingError> {
        dotenv::dotenv().ok();

        let usage_scale = match env::var("OCS_USAGE_SCALE") {
            Ok(v) => v
                .parse::<u32>()
                .map_err(|e| ChargingError::Numeric(format!("OCS_USAGE_SCALE: {}", e)))?,
            Err(_) => DEFAULT_USAGE_SCALE,
        };
        if usage_scale > 28 {
            // rust_decimal carries at most 28 fractional digits
            return Err(ChargingError::Numeric(format!(
                "OCS_USAGE_SCALE out of range: {}",
                usage_scale
            )));
        }

        Ok(EngineConfig {
            usage_scale,
            default_tenant: env::var("OCS_DEFAULT_TENANT")
                .unwrap_or_else(|_| DEFAULT_TENANT.to_string()),
        })
    }
}
