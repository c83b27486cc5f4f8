use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::coin::Coin;
use crate::models::record::RecordPatch;

/// Callback receiving a user's full snapshot after each change.
///
/// Errors are delivered through the same channel so a listener can fall back
/// to an empty portfolio.
pub type SnapshotListener = Box<dyn Fn(Result<Vec<Coin>, CoreError>) + Send + Sync>;

/// Per-user document store holding portfolio records.
///
/// Records are keyed by `record_key(user_id, coin_id)`. Writes are
/// last-write-wins; nothing is locked across coins or users.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PortfolioStore: Send + Sync {
    /// Create or merge a record. See `RecordPatch` for merge rules.
    ///
    /// Fails with `PermissionDenied` when the key already holds a record of
    /// another user.
    async fn upsert(&self, patch: RecordPatch) -> Result<(), CoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn remove(&self, user_id: &str, coin_id: &str) -> Result<(), CoreError>;

    /// Current snapshot of a user's coins.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Coin>, CoreError>;

    /// Whether a record exists for this user and coin.
    async fn exists_for_user(&self, user_id: &str, coin_id: &str) -> Result<bool, CoreError>;

    /// Register a push channel for a user's snapshot.
    ///
    /// The listener fires once with the current snapshot, then after every
    /// insert, update or delete of that user's records until the returned
    /// `Subscription` is canceled or dropped.
    async fn subscribe(
        &self,
        user_id: &str,
        listener: SnapshotListener,
    ) -> Result<Subscription, CoreError>;
}

/// Handle to a live snapshot subscription.
///
/// `cancel` is idempotent. Once it returns, the listener is never invoked again.
/// Dropping the handle cancels it.
pub struct Subscription {
    id: Uuid,
    user_id: String,
    canceller: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(user_id: impl Into<String>, canceller: impl FnOnce() + Send + 'static) -> Self {
        Self::with_id(Uuid::new_v4(), user_id, canceller)
    }

    pub fn with_id(
        id: Uuid,
        user_id: impl Into<String>,
        canceller: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            canceller: Some(Box::new(canceller)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_active(&self) -> bool {
        self.canceller.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(canceller) = self.canceller.take() {
            canceller();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("active", &self.is_active())
            .finish()
    }
}
