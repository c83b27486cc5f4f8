use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::CoreError;
use crate::models::coin::Coin;
use crate::models::edit::CoinEdit;
use crate::models::record::RecordPatch;
use crate::models::session::SyncStatus;
use crate::providers::traits::CoinLookup;
use crate::services::edit_service::EditService;
use crate::storage::traits::{PortfolioStore, SnapshotListener, Subscription};

#[derive(Debug)]
struct SyncState {
    status: SyncStatus,
    user_id: Option<String>,
    coins: Vec<Coin>,
    /// Bumped whenever a session starts or ends. Snapshots tagged with an
    /// older generation belong to a finished session and are dropped.
    generation: u64,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            status: SyncStatus::Unauthenticated,
            user_id: None,
            coins: Vec::new(),
            generation: 0,
        }
    }
}

fn lock_state(state: &Mutex<SyncState>) -> MutexGuard<'_, SyncState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Keeps the local tracked-coin set in step with the portfolio store.
///
/// The local set is a cache: after every mutation it is reloaded from the
/// store, and every subscription push replaces it wholesale. Signed-out users
/// get a purely in-memory set that is never persisted.
///
/// No operation here returns an error. Store failures are logged and leave the
/// local set empty (failed loads) or as optimistically updated (failed writes);
/// the next snapshot reconciles it.
///
/// Lock order: store → state, and subscription slot → state. The state lock is
/// never held across an `.await` or a store call.
pub struct TrackedCoinSynchronizer {
    store: Arc<dyn PortfolioStore>,
    edit_service: EditService,
    state: Arc<Mutex<SyncState>>,
    subscription: Mutex<Option<Subscription>>,
}

impl TrackedCoinSynchronizer {
    pub fn new(store: Arc<dyn PortfolioStore>) -> Self {
        Self {
            store,
            edit_service: EditService::new(),
            state: Arc::new(Mutex::new(SyncState::default())),
            subscription: Mutex::new(None),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn status(&self) -> SyncStatus {
        lock_state(&self.state).status
    }

    pub fn user_id(&self) -> Option<String> {
        lock_state(&self.state).user_id.clone()
    }

    /// Copy of the current tracked set.
    pub fn tracked_coins(&self) -> Vec<Coin> {
        lock_state(&self.state).coins.clone()
    }

    pub fn is_tracked(&self, coin_id: &str) -> bool {
        lock_state(&self.state).coins.iter().any(|c| c.id == coin_id)
    }

    pub fn has_active_subscription(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    // ── Session lifecycle ───────────────────────────────────────────

    /// React to the auth provider resolving to a user (`Some`) or to signed-out (`None`).
    pub async fn on_auth_changed(&self, user_id: Option<&str>) {
        match user_id {
            Some(user_id) => self.start_session(user_id).await,
            None => self.end_session(),
        }
    }

    /// Re-run the initial load for the current user after a failure.
    pub async fn retry(&self) {
        let user_id = {
            let state = lock_state(&self.state);
            match (&state.user_id, state.status) {
                (Some(user_id), SyncStatus::Error) => user_id.clone(),
                _ => return,
            }
        };
        self.start_session(&user_id).await;
    }

    /// Sign-out or navigation away: clear the tracked set and cancel the subscription.
    pub fn end_session(&self) {
        self.cancel_subscription();
        let mut state = lock_state(&self.state);
        state.generation += 1;
        state.coins.clear();
        if let Some(user_id) = state.user_id.take() {
            info!("session ended for {user_id}");
        }
        state.status = SyncStatus::Unauthenticated;
    }

    async fn start_session(&self, user_id: &str) {
        self.cancel_subscription();
        let generation = {
            let mut state = lock_state(&self.state);
            state.generation += 1;
            state.coins.clear();
            state.user_id = Some(user_id.to_string());
            state.status = SyncStatus::Loading;
            state.generation
        };
        info!("loading portfolio for {user_id}");

        match self.store.list_for_user(user_id).await {
            Ok(coins) => {
                if !self.apply_snapshot(generation, coins) {
                    return;
                }
            }
            Err(e) => {
                warn!("initial portfolio load for {user_id} failed: {e}");
                self.fail_session(generation);
                return;
            }
        }

        let listener = snapshot_listener(Arc::clone(&self.state), generation);
        match self.store.subscribe(user_id, listener).await {
            Ok(subscription) => self.install_subscription(generation, subscription),
            Err(e) => {
                warn!("portfolio subscription for {user_id} failed: {e}");
                self.fail_session(generation);
            }
        }
    }

    /// Keep the subscription only if its session is still the current one.
    fn install_subscription(&self, generation: u64, subscription: Subscription) {
        let to_cancel = {
            let mut slot = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
            let mut state = lock_state(&self.state);
            if state.generation != generation {
                Some(subscription)
            } else {
                state.status = SyncStatus::Synced;
                info!(
                    "portfolio synced for {} ({} coins)",
                    subscription.user_id(),
                    state.coins.len()
                );
                slot.replace(subscription)
            }
        };
        if let Some(mut stale) = to_cancel {
            stale.cancel();
        }
    }

    fn cancel_subscription(&self) {
        let taken = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut subscription) = taken {
            subscription.cancel();
            debug!("portfolio subscription {} canceled", subscription.id());
        }
    }

    fn fail_session(&self, generation: u64) {
        let mut state = lock_state(&self.state);
        if state.generation == generation {
            state.coins.clear();
            state.status = SyncStatus::Error;
        }
    }

    /// Replace the tracked set if `generation` is still current.
    fn apply_snapshot(&self, generation: u64, coins: Vec<Coin>) -> bool {
        let mut state = lock_state(&self.state);
        if state.generation != generation {
            debug!("dropping snapshot from finished session {generation}");
            return false;
        }
        state.coins = coins;
        true
    }

    /// Signed-in user and current generation, or `None` in local-only mode.
    fn session(&self) -> Option<(String, u64)> {
        let state = lock_state(&self.state);
        state.user_id.clone().map(|user_id| (user_id, state.generation))
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Add a coin picked from search results.
    ///
    /// A coin already in the tracked set is not duplicated: it keeps its
    /// progress and target and only takes the fresh display fields (price,
    /// name, image). Returns `true` when a new entry was added locally.
    pub async fn add_coin(&self, coin: Coin) -> bool {
        let (payload, added) = {
            let mut state = lock_state(&self.state);
            match state.coins.iter().position(|c| c.id == coin.id) {
                Some(idx) => {
                    let existing = &mut state.coins[idx];
                    existing.refresh_display_from(&coin);
                    (existing.clone(), false)
                }
                None => {
                    state.coins.push(coin.clone());
                    (coin, true)
                }
            }
        };

        let Some((user_id, generation)) = self.session() else {
            debug!("added {} to local-only portfolio", payload.id);
            return added;
        };

        let exists = self.record_exists(&user_id, &payload.id).await;
        let payload = if exists && added {
            // Tracked remotely but missing from the local cache: keep the
            // stored progress and target.
            self.stored_coin(&user_id, &payload.id)
                .await
                .map(|mut stored| {
                    stored.refresh_display_from(&payload);
                    stored
                })
                .unwrap_or(payload)
        } else {
            payload
        };

        self.persist(&user_id, payload, exists).await;
        self.refresh(&user_id, generation).await;
        added
    }

    /// Apply a savings-target edit to a tracked coin.
    ///
    /// Returns the updated coin, or `None` when the coin is not tracked.
    pub async fn edit_coin(&self, coin_id: &str, edit: &CoinEdit) -> Option<Coin> {
        let updated = {
            let mut state = lock_state(&self.state);
            let Some(coin) = state.coins.iter_mut().find(|c| c.id == coin_id) else {
                debug!("edit ignored: {coin_id} is not tracked");
                return None;
            };
            let updated = self.edit_service.apply(coin, edit);
            *coin = updated.clone();
            updated
        };

        if let Some((user_id, generation)) = self.session() {
            let exists = self.record_exists(&user_id, coin_id).await;
            self.persist(&user_id, updated.clone(), exists).await;
            self.refresh(&user_id, generation).await;
        }
        Some(updated)
    }

    /// Stop tracking a coin. Returns `false` (and does nothing) when it is not tracked.
    pub async fn delete_coin(&self, coin_id: &str) -> bool {
        let removed = {
            let mut state = lock_state(&self.state);
            let before = state.coins.len();
            state.coins.retain(|c| c.id != coin_id);
            state.coins.len() != before
        };
        if !removed {
            return false;
        }

        if let Some((user_id, generation)) = self.session() {
            if let Err(e) = self.store.remove(&user_id, coin_id).await {
                warn!("failed to delete {coin_id} for {user_id}: {e}");
            }
            self.refresh(&user_id, generation).await;
        }
        true
    }

    /// Pull current prices for every tracked coin and store the ones that moved.
    ///
    /// Returns how many coins got a new price.
    pub async fn refresh_prices(&self, lookup: &dyn CoinLookup) -> usize {
        let ids: Vec<String> = self.tracked_coins().into_iter().map(|c| c.id).collect();
        if ids.is_empty() {
            return 0;
        }
        let prices = lookup.current_prices(&ids).await;

        let changed: Vec<Coin> = {
            let mut state = lock_state(&self.state);
            state
                .coins
                .iter_mut()
                .filter_map(|coin| {
                    let price = *prices.get(&coin.id)?;
                    if price == coin.price || !price.is_finite() || price < 0.0 {
                        return None;
                    }
                    coin.price = price;
                    Some(coin.clone())
                })
                .collect()
        };
        debug!("{} of {} tracked prices changed", changed.len(), ids.len());

        if changed.is_empty() {
            return 0;
        }
        if let Some((user_id, generation)) = self.session() {
            for coin in &changed {
                self.persist(&user_id, coin.clone(), true).await;
            }
            self.refresh(&user_id, generation).await;
        }
        changed.len()
    }

    // ── Store plumbing ──────────────────────────────────────────────

    /// Existence check deciding whether a write stamps `createdAt`.
    /// On failure assume the record exists so an existing stamp is never overwritten.
    async fn record_exists(&self, user_id: &str, coin_id: &str) -> bool {
        match self.store.exists_for_user(user_id, coin_id).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("existence check for {coin_id} failed: {e}");
                true
            }
        }
    }

    async fn stored_coin(&self, user_id: &str, coin_id: &str) -> Option<Coin> {
        match self.store.list_for_user(user_id).await {
            Ok(coins) => coins.into_iter().find(|c| c.id == coin_id),
            Err(e) => {
                warn!("could not read stored {coin_id} for {user_id}: {e}");
                None
            }
        }
    }

    async fn persist(&self, user_id: &str, coin: Coin, exists: bool) {
        let coin_id = coin.id.clone();
        let patch = if exists {
            RecordPatch::update(user_id, coin)
        } else {
            RecordPatch::create(user_id, coin)
        };
        if let Err(e) = self.store.upsert(patch).await {
            warn!("failed to save {coin_id} for {user_id}: {e}");
        }
    }

    /// Reload the tracked set after a mutation.
    ///
    /// In the `Error` state this is the retry point and re-runs the full
    /// session start. A failed reload keeps the optimistic local set.
    async fn refresh(&self, user_id: &str, generation: u64) {
        if self.status() == SyncStatus::Error {
            self.start_session(user_id).await;
            return;
        }
        match self.store.list_for_user(user_id).await {
            Ok(coins) => {
                if self.apply_snapshot(generation, coins) {
                    debug!("portfolio refreshed for {user_id}");
                }
            }
            Err(e) => warn!("portfolio refresh for {user_id} failed, keeping local state: {e}"),
        }
    }
}

/// Subscription callback: every delivery overwrites the tracked set.
fn snapshot_listener(state: Arc<Mutex<SyncState>>, generation: u64) -> SnapshotListener {
    Box::new(move |snapshot: Result<Vec<Coin>, CoreError>| {
        let mut state = lock_state(&state);
        if state.generation != generation {
            return;
        }
        match snapshot {
            Ok(coins) => {
                debug!("snapshot push with {} coins", coins.len());
                state.coins = coins;
                if state.status == SyncStatus::Error {
                    state.status = SyncStatus::Synced;
                }
            }
            Err(e) => {
                warn!("portfolio subscription error: {e}");
                state.coins.clear();
                state.status = SyncStatus::Error;
            }
        }
    })
}

impl std::fmt::Debug for TrackedCoinSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock_state(&self.state);
        f.debug_struct("TrackedCoinSynchronizer")
            .field("status", &state.status)
            .field("user_id", &state.user_id)
            .field("coins", &state.coins.len())
            .finish()
    }
}
