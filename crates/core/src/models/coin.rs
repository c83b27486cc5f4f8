use serde::{Deserialize, Serialize};

/// Sentinel stored in `Coin::address` when the provider has no contract address.
pub const NO_ADDRESS: &str = "N/A";

/// A tracked portfolio entry.
///
/// `progress` is the holding the user has saved so far and
/// `desired_highest_number` is the savings target. Whether a target is set
/// decides how an edit is applied (see `services::edit_service`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    /// Stable provider id (e.g., "bitcoin"). Unique within one user's tracked set.
    pub id: String,

    /// Display name (e.g., "Bitcoin")
    pub name: String,

    /// Ticker symbol as returned by the provider (e.g., "btc")
    pub symbol: String,

    /// Contract address, or `"N/A"`
    pub address: String,

    /// Icon URI
    pub image: String,

    /// Last known unit price in USD
    pub price: f64,

    /// Current holding toward the target. Absent means 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    /// User-set target holding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_highest_number: Option<f64>,
}

impl Coin {
    /// Create an untracked coin candidate (no progress, no target).
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into(),
            address: NO_ADDRESS.to_string(),
            image: String::new(),
            price,
            progress: None,
            desired_highest_number: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.desired_highest_number = Some(target);
        self
    }

    /// Holding with an absent value treated as 0.
    pub fn progress_or_zero(&self) -> f64 {
        self.progress.unwrap_or(0.0)
    }

    /// A target only counts as set when it is strictly positive.
    pub fn has_target(&self) -> bool {
        matches!(self.desired_highest_number, Some(t) if t > 0.0)
    }

    /// Value of the current holding in USD.
    pub fn holding_value(&self) -> f64 {
        self.progress_or_zero() * self.price
    }

    /// Take display fields (name, symbol, address, image, price) from a fresher
    /// copy of the same coin. Progress and target are left untouched.
    pub fn refresh_display_from(&mut self, fresh: &Coin) {
        self.name = fresh.name.clone();
        self.symbol = fresh.symbol.clone();
        self.address = fresh.address.clone();
        self.image = fresh.image.clone();
        self.price = fresh.price;
    }
}
