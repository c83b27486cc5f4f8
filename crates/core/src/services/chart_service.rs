use crate::models::chart::ChartPair;
use crate::models::settings::Settings;

/// Builds symbols for the embedded chart widget.
///
/// The widget takes `EXCHANGE:BASEQUOTE` (e.g., `BINANCE:BTCUSD`) and is
/// otherwise opaque.
#[derive(Debug, Clone)]
pub struct ChartService {
    exchange: String,
    quote: String,
    default_pair: String,
}

impl ChartService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            exchange: settings.chart_exchange.to_uppercase(),
            quote: settings.chart_quote.to_uppercase(),
            default_pair: settings.default_chart_pair.to_uppercase(),
        }
    }

    /// `"btcusd"` → `"BINANCE:BTCUSD"`.
    pub fn symbol_for_pair(&self, pair: &str) -> String {
        format!("{}:{}", self.exchange, pair.trim().to_uppercase())
    }

    /// Widget symbol for the pair shown on first load.
    pub fn default_symbol(&self) -> String {
        self.symbol_for_pair(&self.default_pair)
    }

    /// `"eth"` → `"ETHUSD"`.
    pub fn pair_for_coin_symbol(&self, coin_symbol: &str) -> String {
        format!("{}{}", coin_symbol.trim().to_uppercase(), self.quote)
    }

    /// Pairs whose name or symbol contains `query`, case-insensitively.
    /// An empty query keeps every pair.
    pub fn filter_pairs<'a>(&self, pairs: &'a [ChartPair], query: &str) -> Vec<&'a ChartPair> {
        let needle = query.trim().to_lowercase();
        pairs
            .iter()
            .filter(|p| {
                needle.is_empty()
                    || p.name.to_lowercase().contains(&needle)
                    || p.symbol.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

impl Default for ChartService {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}
