use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Fixed conversion used to show the portfolio total in a second currency.
///
/// There is no exchange-rate service behind this; `rate` is how many units of
/// `code` one US dollar buys, as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryCurrency {
    pub code: String,
    pub rate: f64,
}

impl Default for SecondaryCurrency {
    fn default() -> Self {
        Self {
            code: "NGN".to_string(),
            rate: 1500.0,
        }
    }
}

/// User-configurable settings for the tracker core.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the CoinGecko-compatible API (no trailing slash)
    pub api_base_url: String,

    /// Quote currency for market data (e.g., "usd")
    pub vs_currency: String,

    /// HTTP request timeout in seconds (native targets only)
    pub request_timeout_secs: u64,

    /// Optional CoinGecko demo API key, sent as `x-cg-demo-api-key`
    pub api_key: Option<String>,

    /// Display-only conversion of the total
    pub secondary_currency: SecondaryCurrency,

    /// Exchange prefix for chart widget symbols (e.g., "BINANCE")
    pub chart_exchange: String,

    /// Quote currency appended to a coin symbol to form a chart pair
    pub chart_quote: String,

    /// Pair shown when the chart page opens
    pub default_chart_pair: String,

    /// How many top coins to offer in the chart pair picker
    pub chart_pairs_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.coingecko.com/api/v3".to_string(),
            vs_currency: "usd".to_string(),
            request_timeout_secs: 30,
            api_key: None,
            secondary_currency: SecondaryCurrency::default(),
            chart_exchange: "BINANCE".to_string(),
            chart_quote: "USD".to_string(),
            default_chart_pair: "BTCUSD".to_string(),
            chart_pairs_limit: 100,
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file on disk (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject values the lookup client or aggregator cannot work with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.api_base_url.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "api_base_url must not be empty".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        let rate = self.secondary_currency.rate;
        if !rate.is_finite() || rate < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "secondary currency rate must be finite and non-negative, got {rate}"
            )));
        }
        Ok(())
    }
}
