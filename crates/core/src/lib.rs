pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use log::info;
use std::sync::Arc;

use models::{
    analytics::PortfolioSummary, chart::ChartPair, coin::Coin, edit::CoinEdit,
    session::SyncStatus, settings::Settings,
};
use providers::{coingecko::CoinGeckoClient, traits::CoinLookup};
use services::{
    aggregator::PortfolioAggregator, chart_service::ChartService,
    sync_service::TrackedCoinSynchronizer,
};
use storage::traits::PortfolioStore;

/// Main entry point for the Coin Tracker core library.
///
/// Wires the lookup client, the tracked-coin synchronizer and the pure
/// services together. The store is injected; nothing here is a global.
/// None of the portfolio operations return errors: failures are logged and
/// degrade to an empty or unchanged portfolio.
#[must_use]
pub struct CoinTracker {
    settings: Settings,
    lookup: Box<dyn CoinLookup>,
    synchronizer: TrackedCoinSynchronizer,
    aggregator: PortfolioAggregator,
    chart_service: ChartService,
}

impl std::fmt::Debug for CoinTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinTracker")
            .field("lookup", &self.lookup.name())
            .field("synchronizer", &self.synchronizer)
            .field("settings", &self.settings)
            .finish()
    }
}

impl CoinTracker {
    /// Create a tracker backed by the CoinGecko API.
    pub fn new(settings: Settings, store: Arc<dyn PortfolioStore>) -> Self {
        let lookup = Box::new(CoinGeckoClient::new(&settings));
        Self::with_lookup(settings, lookup, store)
    }

    /// Create a tracker with a custom lookup service.
    pub fn with_lookup(
        settings: Settings,
        lookup: Box<dyn CoinLookup>,
        store: Arc<dyn PortfolioStore>,
    ) -> Self {
        let chart_service = ChartService::new(&settings);
        Self {
            settings,
            lookup,
            synchronizer: TrackedCoinSynchronizer::new(store),
            aggregator: PortfolioAggregator::new(),
            chart_service,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Session ─────────────────────────────────────────────────────

    /// The auth provider resolved to `user_id`: load and subscribe to their
    /// portfolio, then bring the stored prices up to date.
    pub async fn sign_in(&self, user_id: &str) {
        self.synchronizer.on_auth_changed(Some(user_id)).await;
        self.refresh_prices_on_load().await;
    }

    /// The user signed out: clear the portfolio and drop the subscription.
    pub fn sign_out(&self) {
        self.synchronizer.end_session();
    }

    /// Retry the initial load after a failed sign-in.
    pub async fn retry(&self) {
        self.synchronizer.retry().await;
        self.refresh_prices_on_load().await;
    }

    async fn refresh_prices_on_load(&self) {
        if self.synchronizer.status() != SyncStatus::Synced {
            return;
        }
        let changed = self.synchronizer.refresh_prices(self.lookup.as_ref()).await;
        if changed > 0 {
            info!("refreshed {changed} stale prices on load");
        }
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.synchronizer.status()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.synchronizer.user_id()
    }

    // ── Search & tracked coins ──────────────────────────────────────

    /// Search coins by name, symbol or contract address.
    pub async fn search(&self, query: &str) -> Vec<Coin> {
        self.lookup.search(query).await.collect()
    }

    /// Start tracking a coin picked from search results.
    /// Returns `false` when the coin was already tracked (its display fields are refreshed).
    pub async fn select_coin(&self, coin: Coin) -> bool {
        self.synchronizer.add_coin(coin).await
    }

    /// Set a target (first edit) or top up the holding (later edits).
    pub async fn edit_coin(&self, coin_id: &str, edit: &CoinEdit) -> Option<Coin> {
        self.synchronizer.edit_coin(coin_id, edit).await
    }

    pub async fn remove_coin(&self, coin_id: &str) -> bool {
        self.synchronizer.delete_coin(coin_id).await
    }

    /// Refresh prices of all tracked coins. Returns how many changed.
    pub async fn refresh_prices(&self) -> usize {
        self.synchronizer.refresh_prices(self.lookup.as_ref()).await
    }

    #[must_use]
    pub fn tracked_coins(&self) -> Vec<Coin> {
        self.synchronizer.tracked_coins()
    }

    // ── Totals ──────────────────────────────────────────────────────

    /// Total portfolio value in USD.
    #[must_use]
    pub fn total_value(&self) -> f64 {
        self.aggregator
            .compute_total(&self.synchronizer.tracked_coins())
    }

    /// Total converted with the configured secondary-currency rate.
    #[must_use]
    pub fn total_value_secondary(&self) -> f64 {
        self.aggregator
            .convert(self.total_value(), self.settings.secondary_currency.rate)
    }

    /// Displayed progress of a tracked coin, or `None` when it is not tracked.
    #[must_use]
    pub fn progress_percentage(&self, coin_id: &str) -> Option<f64> {
        self.synchronizer
            .tracked_coins()
            .iter()
            .find(|c| c.id == coin_id)
            .map(|c| self.aggregator.compute_progress_percentage(c))
    }

    #[must_use]
    pub fn summary(&self) -> PortfolioSummary {
        self.aggregator.summarize(&self.synchronizer.tracked_coins())
    }

    // ── Charts ──────────────────────────────────────────────────────

    /// Widget symbol for a pair, e.g. `"BTCUSD"` → `"BINANCE:BTCUSD"`.
    #[must_use]
    pub fn chart_symbol(&self, pair: &str) -> String {
        self.chart_service.symbol_for_pair(pair)
    }

    /// Widget symbol for a tracked coin's ticker, e.g. `"eth"` → `"BINANCE:ETHUSD"`.
    #[must_use]
    pub fn chart_symbol_for_coin(&self, coin_symbol: &str) -> String {
        self.chart_service
            .symbol_for_pair(&self.chart_service.pair_for_coin_symbol(coin_symbol))
    }

    /// Pairs for the chart picker, filtered by `query` (empty keeps all).
    pub async fn chart_pairs(&self, query: &str) -> Vec<ChartPair> {
        let pairs = self.lookup.market_pairs(self.settings.chart_pairs_limit).await;
        self.chart_service
            .filter_pairs(&pairs, query)
            .into_iter()
            .cloned()
            .collect()
    }
}
