//! Engine configuration, injected rather than read from ambient globals.

use serde::{Deserialize, Serialize};

/// ISO 4217 currency code carried on orders and reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Toggles and defaults the fulfillment/adjustment engine needs.
///
/// Passed explicitly into the reconciler so unit tests stay deterministic;
/// there is no process-global configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Currency for new orders.
    pub currency: CurrencyCode,
    /// Resolve the tax zone from the ship address (true) or bill address.
    pub tax_using_ship_address: bool,
    /// When false, stock counters are never consulted or mutated.
    pub track_inventory: bool,
    /// Whether checkout may complete after a payment gateway error.
    pub allow_checkout_on_gateway_error: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::default(),
            tax_using_ship_address: true,
            track_inventory: true,
            allow_checkout_on_gateway_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_codes_are_uppercased() {
        assert_eq!(CurrencyCode::new("aud").as_str(), "AUD");
    }

    #[test]
    fn default_config_tracks_inventory() {
        let config = EngineConfig::default();
        assert!(config.track_inventory);
        assert!(config.tax_using_ship_address);
        assert!(!config.allow_checkout_on_gateway_error);
    }
}
