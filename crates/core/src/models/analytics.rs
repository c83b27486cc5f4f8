use serde::{Deserialize, Serialize};

/// Roll-up of the tracked coins at the moment it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Sum of `holding * price` over all tracked coins, in USD
    pub total_value: f64,

    /// Per-coin breakdown, in tracked order
    pub coins: Vec<CoinSummary>,
}

/// Progress of a single tracked coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSummary {
    pub coin_id: String,
    pub symbol: String,

    /// Current holding (absent progress reported as 0)
    pub holding: f64,

    /// Savings target, if one is set
    pub target: Option<f64>,

    /// `holding * price` in USD
    pub value: f64,

    /// Displayed progress toward the target, clamped to [0, 100]
    pub progress_pct: f64,
}
