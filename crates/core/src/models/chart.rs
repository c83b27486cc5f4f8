use serde::{Deserialize, Serialize};

/// A tradable pair offered to the chart widget's symbol picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPair {
    /// Provider coin id (e.g., "bitcoin")
    pub id: String,

    /// Pair code without exchange prefix (e.g., "BTCUSD")
    pub symbol: String,

    /// Label shown in the picker (e.g., "Bitcoin / US Dollar")
    pub name: String,
}
