use async_trait::async_trait;
use std::collections::HashMap;

use crate::models::chart::ChartPair;
use crate::models::coin::Coin;

/// Trait abstraction for coin lookup services.
///
/// Lookups are fail-soft: a failed call is logged by the implementation and
/// shows up to the caller as an empty result, never as an error.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait CoinLookup: Send + Sync {
    /// Human-readable name of this lookup service (for logs).
    fn name(&self) -> &str;

    /// Search coins by free text and join them with current prices.
    ///
    /// Candidates come back with `progress` and `desired_highest_number` unset.
    /// An empty query returns no candidates without touching the network.
    async fn search(&self, query: &str) -> CoinCandidates;

    /// Current USD price per coin id. Ids the service does not know are absent,
    /// as are ids whose batch failed.
    async fn current_prices(&self, ids: &[String]) -> HashMap<String, f64>;

    /// Top `limit` coins by market cap, as chart pairs quoted in USD.
    async fn market_pairs(&self, limit: u32) -> Vec<ChartPair>;
}

/// One-shot sequence of search results.
///
/// Consumed as an iterator; searching again needs a new `search` call.
#[derive(Debug)]
pub struct CoinCandidates {
    inner: std::vec::IntoIter<Coin>,
}

impl CoinCandidates {
    pub fn new(coins: Vec<Coin>) -> Self {
        Self {
            inner: coins.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Default for CoinCandidates {
    fn default() -> Self {
        Self::empty()
    }
}

impl Iterator for CoinCandidates {
    type Item = Coin;

    fn next(&mut self) -> Option<Coin> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for CoinCandidates {}
