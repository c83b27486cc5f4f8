use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use super::traits::{CoinCandidates, CoinLookup};
use crate::errors::CoreError;
use crate::models::chart::ChartPair;
use crate::models::coin::{Coin, NO_ADDRESS};
use crate::models::settings::Settings;

const PROVIDER: &str = "CoinGecko";
const API_KEY_HEADER: &str = "x-cg-demo-api-key";
/// Page size of `/coins/markets`. Search prices only the first page; price
/// refreshes request one page per chunk of ids.
const MARKETS_PER_PAGE: usize = 100;

/// CoinGecko API client for coin search and market data.
///
/// - **Free**: works without a key; a demo key raises the rate limit.
/// - **Endpoints**: `/search?query=`, `/coins/markets?vs_currency=&ids=`
///
/// Search joins the two calls: `/search` yields candidate ids, `/coins/markets`
/// yields their prices. Either call failing drops the whole result.
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    vs_currency: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(settings: &Settings) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(settings.request_timeout_secs));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            vs_currency: settings.vs_currency.clone(),
            api_key: settings.api_key.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// Send a request and decode its JSON body, treating any non-2xx status as an API error.
    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, CoreError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("{what} returned HTTP {status}"),
            });
        }
        resp.json().await.map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse {what} response: {e}"),
        })
    }

    async fn fetch_markets(&self, ids: &[String]) -> Result<Vec<MarketEntry>, CoreError> {
        let per_page = MARKETS_PER_PAGE.to_string();
        let request = self.get("/coins/markets").query(&[
            ("vs_currency", self.vs_currency.as_str()),
            ("ids", ids.join(",").as_str()),
            ("order", "market_cap_desc"),
            ("per_page", per_page.as_str()),
            ("page", "1"),
            ("sparkline", "false"),
        ]);
        self.fetch(request, "market data").await
    }

    async fn try_search(&self, query: &str) -> Result<Vec<Coin>, CoreError> {
        let request = self.get("/search").query(&[("query", query)]);
        let found: SearchResponse = self.fetch(request, "search").await?;
        debug!("{PROVIDER} search '{query}' matched {} coins", found.coins.len());

        let ids: Vec<String> = found.coins.iter().map(|c| c.id.clone()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let market = self.fetch_markets(&ids).await?;
        let prices = price_map(market);

        Ok(found
            .coins
            .into_iter()
            .map(|entry| {
                let price = prices.get(&entry.id).copied().unwrap_or(0.0);
                entry.into_coin(price)
            })
            .collect())
    }

    async fn try_pairs(&self, limit: u32) -> Result<Vec<ChartPair>, CoreError> {
        let per_page = limit.to_string();
        let request = self.get("/coins/markets").query(&[
            ("vs_currency", self.vs_currency.as_str()),
            ("order", "market_cap_desc"),
            ("per_page", per_page.as_str()),
            ("page", "1"),
            ("sparkline", "false"),
        ]);
        let market: Vec<MarketEntry> = self.fetch(request, "market pairs").await?;
        Ok(market
            .into_iter()
            .map(|m| ChartPair {
                symbol: format!("{}USD", m.symbol.to_uppercase()),
                name: format!("{} / US Dollar", m.name),
                id: m.id,
            })
            .collect())
    }
}

/// Prices keyed by coin id. A `null` price counts as 0.
fn price_map(market: Vec<MarketEntry>) -> HashMap<String, f64> {
    market
        .into_iter()
        .map(|m| (m.id, m.current_price.unwrap_or(0.0)))
        .collect()
}

// ── CoinGecko API response types ────────────────────────────────────

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    id: String,
    name: String,
    symbol: String,
    #[serde(default)]
    large: String,
    #[serde(default)]
    contract_address: Option<String>,
}

impl SearchEntry {
    fn into_coin(self, price: f64) -> Coin {
        let address = self
            .contract_address
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| NO_ADDRESS.to_string());
        Coin::new(self.id, self.name, self.symbol, price)
            .with_address(address)
            .with_image(self.large)
    }
}

#[derive(Deserialize)]
struct MarketEntry {
    id: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    current_price: Option<f64>,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl CoinLookup for CoinGeckoClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> CoinCandidates {
        let query = query.trim();
        if query.is_empty() {
            return CoinCandidates::empty();
        }
        match self.try_search(query).await {
            Ok(coins) => CoinCandidates::new(coins),
            Err(e) => {
                warn!("{PROVIDER} search for '{query}' failed: {e}");
                CoinCandidates::empty()
            }
        }
    }

    async fn current_prices(&self, ids: &[String]) -> HashMap<String, f64> {
        if ids.is_empty() {
            return HashMap::new();
        }
        let mut prices = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MARKETS_PER_PAGE) {
            match self.fetch_markets(chunk).await {
                Ok(market) => prices.extend(price_map(market)),
                Err(e) => warn!("{PROVIDER} price refresh for {} coins failed: {e}", chunk.len()),
            }
        }
        prices
    }

    async fn market_pairs(&self, limit: u32) -> Vec<ChartPair> {
        if limit == 0 {
            return Vec::new();
        }
        match self.try_pairs(limit).await {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!("{PROVIDER} market pairs lookup failed: {e}");
                Vec::new()
            }
        }
    }
}
