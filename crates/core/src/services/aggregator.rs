use crate::models::analytics::{CoinSummary, PortfolioSummary};
use crate::models::coin::Coin;

/// Rolls the tracked coins up into portfolio totals and progress figures.
///
/// Pure business logic with no I/O or state. Stored values are never clamped;
/// only the displayed percentage is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioAggregator;

impl PortfolioAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Sum of `progress * price` over all coins, absent progress counting as 0.
    pub fn compute_total(&self, coins: &[Coin]) -> f64 {
        coins.iter().map(Coin::holding_value).sum()
    }

    /// Progress toward the target as a percentage in [0, 100].
    ///
    /// 0 when no positive target is set. A holding above the target shows 100.
    pub fn compute_progress_percentage(&self, coin: &Coin) -> f64 {
        match coin.desired_highest_number {
            Some(target) if target > 0.0 => {
                let pct = 100.0 * coin.progress_or_zero() / target;
                pct.clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }

    /// Display conversion with a fixed rate (e.g., USD total → secondary currency).
    pub fn convert(&self, total: f64, rate: f64) -> f64 {
        total * rate
    }

    /// Total plus a per-coin breakdown, in tracked order.
    pub fn summarize(&self, coins: &[Coin]) -> PortfolioSummary {
        let summaries = coins
            .iter()
            .map(|coin| CoinSummary {
                coin_id: coin.id.clone(),
                symbol: coin.symbol.clone(),
                holding: coin.progress_or_zero(),
                target: coin.desired_highest_number,
                value: coin.holding_value(),
                progress_pct: self.compute_progress_percentage(coin),
            })
            .collect();

        PortfolioSummary {
            total_value: self.compute_total(coins),
            coins: summaries,
        }
    }
}
