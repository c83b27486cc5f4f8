use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::coin::Coin;

/// Build the composite document key for a user's coin: `"{user_id}_{coin_id}"`.
pub fn record_key(user_id: &str, coin_id: &str) -> String {
    format!("{user_id}_{coin_id}")
}

/// Persisted envelope around a `Coin`, owned by the portfolio store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRecord {
    pub user_id: String,
    pub coin_id: String,
    pub coin: Coin,
    /// Set once, on the first write of this record.
    pub created_at: DateTime<Utc>,
    /// Set on every write.
    pub updated_at: DateTime<Utc>,
}

impl PortfolioRecord {
    pub fn key(&self) -> String {
        record_key(&self.user_id, &self.coin_id)
    }
}

/// A create-or-merge write against the store.
///
/// Present fields overwrite, absent ones are preserved. `coin` always replaces
/// the stored coin as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPatch {
    pub user_id: String,
    pub coin: Coin,
    /// Only supplied on the first write of a record.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RecordPatch {
    /// Patch for a record that already exists: `created_at` is left alone.
    pub fn update(user_id: impl Into<String>, coin: Coin) -> Self {
        Self {
            user_id: user_id.into(),
            coin,
            created_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Patch for a brand-new record: stamps both timestamps with the same instant.
    pub fn create(user_id: impl Into<String>, coin: Coin) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            coin,
            created_at: Some(now),
            updated_at: now,
        }
    }

    pub fn coin_id(&self) -> &str {
        &self.coin.id
    }

    pub fn key(&self) -> String {
        record_key(&self.user_id, &self.coin.id)
    }

    /// Apply this patch on top of an existing record, or build a new one.
    pub fn merge_into(self, existing: Option<PortfolioRecord>) -> PortfolioRecord {
        match existing {
            Some(mut record) => {
                if let Some(created_at) = self.created_at {
                    record.created_at = created_at;
                }
                record.user_id = self.user_id;
                record.coin_id = self.coin.id.clone();
                record.coin = self.coin;
                record.updated_at = self.updated_at;
                record
            }
            None => PortfolioRecord {
                coin_id: self.coin.id.clone(),
                created_at: self.created_at.unwrap_or(self.updated_at),
                user_id: self.user_id,
                coin: self.coin,
                updated_at: self.updated_at,
            },
        }
    }
}
