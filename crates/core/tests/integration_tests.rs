use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use coin_tracker_core::errors::CoreError;
use coin_tracker_core::models::chart::ChartPair;
use coin_tracker_core::models::coin::Coin;
use coin_tracker_core::models::edit::CoinEdit;
use coin_tracker_core::models::record::{PortfolioRecord, RecordPatch};
use coin_tracker_core::models::session::SyncStatus;
use coin_tracker_core::models::settings::Settings;
use coin_tracker_core::providers::traits::{CoinCandidates, CoinLookup};
use coin_tracker_core::services::sync_service::TrackedCoinSynchronizer;
use coin_tracker_core::storage::memory::MemoryStore;
use coin_tracker_core::storage::traits::{PortfolioStore, SnapshotListener, Subscription};
use coin_tracker_core::CoinTracker;

// ═══════════════════════════════════════════════════════════════════
// Mock Lookup (for testing without real API calls)
// ═══════════════════════════════════════════════════════════════════

struct MockLookup {
    coins: Vec<Coin>,
    prices: Arc<Mutex<HashMap<String, f64>>>,
}

impl MockLookup {
    fn new() -> Self {
        let coins = vec![
            btc(),
            Coin::new("ethereum", "Ethereum", "eth", 3_000.0),
            Coin::new("wrapped-bitcoin", "Wrapped Bitcoin", "wbtc", 49_900.0),
        ];
        let prices = coins.iter().map(|c| (c.id.clone(), c.price)).collect();
        Self {
            coins,
            prices: Arc::new(Mutex::new(prices)),
        }
    }

    /// Handle for moving prices after the lookup is boxed into a tracker.
    fn price_handle(&self) -> Arc<Mutex<HashMap<String, f64>>> {
        Arc::clone(&self.prices)
    }
}

#[async_trait]
impl CoinLookup for MockLookup {
    fn name(&self) -> &str {
        "MockLookup"
    }

    async fn search(&self, query: &str) -> CoinCandidates {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return CoinCandidates::empty();
        }
        CoinCandidates::new(
            self.coins
                .iter()
                .filter(|c| c.id.contains(&needle) || c.symbol.contains(&needle))
                .cloned()
                .collect(),
        )
    }

    async fn current_prices(&self, ids: &[String]) -> HashMap<String, f64> {
        let prices = self.prices.lock().unwrap();
        ids.iter()
            .filter_map(|id| prices.get(id).map(|p| (id.clone(), *p)))
            .collect()
    }

    async fn market_pairs(&self, limit: u32) -> Vec<ChartPair> {
        self.coins
            .iter()
            .take(limit as usize)
            .map(|c| ChartPair {
                id: c.id.clone(),
                symbol: format!("{}USD", c.symbol.to_uppercase()),
                name: format!("{} / US Dollar", c.name),
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════
// Flaky Store: MemoryStore with switchable failures
// ═══════════════════════════════════════════════════════════════════

type SharedListener = Arc<dyn Fn(Result<Vec<Coin>, CoreError>) + Send + Sync>;

#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_list: AtomicBool,
    fail_upsert: AtomicBool,
    fail_remove: AtomicBool,
    fail_exists: AtomicBool,
    fail_subscribe: AtomicBool,
    /// Every listener ever registered, canceled ones included.
    listeners: Mutex<Vec<SharedListener>>,
}

impl FlakyStore {
    fn over(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Push a subscription error to every listener ever registered.
    fn emit_error(&self) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener(Err(CoreError::PermissionDenied("u1".into())));
        }
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), CoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(CoreError::StoreRead(format!("{what} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PortfolioStore for FlakyStore {
    async fn upsert(&self, patch: RecordPatch) -> Result<(), CoreError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(CoreError::StoreWrite("quota exhausted".into()));
        }
        self.inner.upsert(patch).await
    }

    async fn remove(&self, user_id: &str, coin_id: &str) -> Result<(), CoreError> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(CoreError::StoreWrite("remove rejected".into()));
        }
        self.inner.remove(user_id, coin_id).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Coin>, CoreError> {
        Self::check(&self.fail_list, "list")?;
        self.inner.list_for_user(user_id).await
    }

    async fn exists_for_user(&self, user_id: &str, coin_id: &str) -> Result<bool, CoreError> {
        Self::check(&self.fail_exists, "exists")?;
        self.inner.exists_for_user(user_id, coin_id).await
    }

    async fn subscribe(
        &self,
        user_id: &str,
        listener: SnapshotListener,
    ) -> Result<Subscription, CoreError> {
        Self::check(&self.fail_subscribe, "subscribe")?;
        let shared: SharedListener = Arc::from(listener);
        self.listeners.lock().unwrap().push(Arc::clone(&shared));
        self.inner
            .subscribe(user_id, Box::new(move |snapshot| shared(snapshot)))
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn btc() -> Coin {
    Coin::new("bitcoin", "Bitcoin", "btc", 50_000.0)
}

fn eth() -> Coin {
    Coin::new("ethereum", "Ethereum", "eth", 3_000.0)
}

fn tracker(store: &MemoryStore) -> CoinTracker {
    CoinTracker::with_lookup(
        Settings::default(),
        Box::new(MockLookup::new()),
        Arc::new(store.clone()),
    )
}

fn ids(coins: &[Coin]) -> Vec<String> {
    coins.iter().map(|c| c.id.clone()).collect()
}

// ═══════════════════════════════════════════════════════════════════
// End-to-end through the CoinTracker facade
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_full_savings_flow() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);

    tracker.sign_in("u1").await;
    assert_eq!(tracker.status(), SyncStatus::Synced);
    assert_eq!(tracker.user_id().as_deref(), Some("u1"));
    assert!(tracker.tracked_coins().is_empty());

    // 1. Search and pick
    let results = tracker.search("bitcoin").await;
    assert_eq!(ids(&results), vec!["bitcoin", "wrapped-bitcoin"]);
    assert!(tracker.select_coin(results[0].clone()).await);
    assert_eq!(ids(&tracker.tracked_coins()), vec!["bitcoin"]);
    assert_eq!(tracker.total_value(), 0.0);

    // 2. First edit sets target and holding
    let updated = tracker
        .edit_coin("bitcoin", &CoinEdit::initial("2", "0.5"))
        .await
        .unwrap();
    assert_eq!(updated.progress, Some(0.5));
    assert_eq!(updated.desired_highest_number, Some(2.0));
    assert_eq!(tracker.total_value(), 25_000.0);
    assert_eq!(tracker.progress_percentage("bitcoin"), Some(25.0));

    // 3. Later edit tops up
    tracker
        .edit_coin("bitcoin", &CoinEdit::top_up("0.25"))
        .await
        .unwrap();
    assert_eq!(tracker.total_value(), 37_500.0);
    assert_eq!(tracker.progress_percentage("bitcoin"), Some(37.5));
    assert_eq!(tracker.total_value_secondary(), 37_500.0 * 1500.0);

    // 4. The store holds the same state
    let record = store.record("u1", "bitcoin").unwrap();
    assert_eq!(record.coin.progress, Some(0.75));
    assert_eq!(record.coin.desired_highest_number, Some(2.0));

    // 5. Summary
    let summary = tracker.summary();
    assert_eq!(summary.total_value, 37_500.0);
    assert_eq!(summary.coins.len(), 1);
    assert_eq!(summary.coins[0].progress_pct, 37.5);
}

#[tokio::test]
async fn test_progress_of_untracked_coin_is_none() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);
    tracker.sign_in("u1").await;
    assert_eq!(tracker.progress_percentage("bitcoin"), None);
    assert!(tracker.edit_coin("bitcoin", &CoinEdit::initial("1", "1")).await.is_none());
}

#[tokio::test]
async fn test_sign_out_clears_and_next_user_is_isolated() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);

    tracker.sign_in("u1").await;
    tracker.select_coin(btc()).await;
    tracker.edit_coin("bitcoin", &CoinEdit::initial("2", "1")).await;
    assert_eq!(store.subscriber_count("u1"), 1);

    tracker.sign_out();
    assert_eq!(tracker.status(), SyncStatus::Unauthenticated);
    assert_eq!(tracker.user_id(), None);
    assert!(tracker.tracked_coins().is_empty());
    assert_eq!(tracker.total_value(), 0.0);
    assert_eq!(store.subscriber_count("u1"), 0);

    tracker.sign_in("u2").await;
    assert!(tracker.tracked_coins().is_empty());

    // Later writes to u1's portfolio never reach u2.
    store.upsert(RecordPatch::create("u1", eth())).await.unwrap();
    assert!(tracker.tracked_coins().is_empty());
    assert!(store.record("u1", "bitcoin").is_some());
}

#[tokio::test]
async fn test_duplicate_selection_refreshes_display_only() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);
    tracker.sign_in("u1").await;

    assert!(tracker.select_coin(btc()).await);
    tracker.edit_coin("bitcoin", &CoinEdit::initial("2", "0.5")).await;

    let mut repriced = btc();
    repriced.price = 61_000.0;
    assert!(!tracker.select_coin(repriced).await);

    let coins = tracker.tracked_coins();
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0].price, 61_000.0);
    assert_eq!(coins[0].progress, Some(0.5));
    assert_eq!(coins[0].desired_highest_number, Some(2.0));
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn test_remove_coin() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);
    tracker.sign_in("u1").await;
    tracker.select_coin(btc()).await;
    tracker.select_coin(eth()).await;

    assert!(!tracker.remove_coin("dogecoin").await);
    assert_eq!(tracker.tracked_coins().len(), 2);

    assert!(tracker.remove_coin("bitcoin").await);
    assert_eq!(ids(&tracker.tracked_coins()), vec!["ethereum"]);
    assert!(store.record("u1", "bitcoin").is_none());
}

#[tokio::test]
async fn test_local_only_mode_never_persists() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);

    assert!(tracker.select_coin(btc()).await);
    tracker.edit_coin("bitcoin", &CoinEdit::initial("4", "1")).await;
    assert_eq!(tracker.status(), SyncStatus::Unauthenticated);
    assert_eq!(tracker.total_value(), 50_000.0);
    assert_eq!(tracker.progress_percentage("bitcoin"), Some(25.0));
    assert!(tracker.remove_coin("bitcoin").await);
    assert!(store.records().is_empty());

    // Signing in replaces the local set with the stored one.
    tracker.select_coin(eth()).await;
    tracker.sign_in("u1").await;
    assert!(tracker.tracked_coins().is_empty());
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn test_push_from_another_writer() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);
    tracker.sign_in("u1").await;
    tracker.select_coin(btc()).await;

    // e.g. a second device
    store.upsert(RecordPatch::create("u1", eth())).await.unwrap();
    assert_eq!(ids(&tracker.tracked_coins()), vec!["bitcoin", "ethereum"]);

    store.remove("u1", "bitcoin").await.unwrap();
    assert_eq!(ids(&tracker.tracked_coins()), vec!["ethereum"]);
}

#[tokio::test]
async fn test_repeated_sign_in_keeps_one_subscription() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);
    tracker.sign_in("u1").await;
    tracker.sign_in("u1").await;
    assert_eq!(store.subscriber_count("u1"), 1);

    tracker.sign_in("u2").await;
    assert_eq!(store.subscriber_count("u1"), 0);
    assert_eq!(store.subscriber_count("u2"), 1);
}

#[tokio::test]
async fn test_created_at_survives_edits() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);
    tracker.sign_in("u1").await;
    tracker.select_coin(btc()).await;

    let first = store.record("u1", "bitcoin").unwrap();
    assert_eq!(first.created_at, first.updated_at);

    tracker.edit_coin("bitcoin", &CoinEdit::initial("2", "1")).await;
    tracker.select_coin(btc()).await;

    let later = store.record("u1", "bitcoin").unwrap();
    assert_eq!(later.created_at, first.created_at);
    assert!(later.updated_at >= first.updated_at);
}

#[tokio::test]
async fn test_refresh_prices() {
    let store = MemoryStore::new();
    let lookup = MockLookup::new();
    let prices = lookup.price_handle();
    let tracker = CoinTracker::with_lookup(
        Settings::default(),
        Box::new(lookup),
        Arc::new(store.clone()),
    );
    tracker.sign_in("u1").await;
    tracker.select_coin(btc()).await;
    tracker.select_coin(eth()).await;

    assert_eq!(tracker.refresh_prices().await, 0);

    prices.lock().unwrap().insert("bitcoin".into(), 60_000.0);
    assert_eq!(tracker.refresh_prices().await, 1);
    let coins = tracker.tracked_coins();
    assert_eq!(coins[0].price, 60_000.0);
    assert_eq!(coins[1].price, 3_000.0);
    assert_eq!(store.record("u1", "bitcoin").unwrap().coin.price, 60_000.0);

    // Nonsense quotes are ignored.
    prices.lock().unwrap().insert("ethereum".into(), -1.0);
    assert_eq!(tracker.refresh_prices().await, 0);
}

#[tokio::test]
async fn test_sign_in_refreshes_stale_prices() {
    let store = MemoryStore::new();
    store
        .upsert(RecordPatch::create("u1", btc().with_progress(0.5).with_target(2.0)))
        .await
        .unwrap();
    let created = store.record("u1", "bitcoin").unwrap().created_at;

    let lookup = MockLookup::new();
    lookup.price_handle().lock().unwrap().insert("bitcoin".into(), 60_000.0);
    let tracker = CoinTracker::with_lookup(
        Settings::default(),
        Box::new(lookup),
        Arc::new(store.clone()),
    );

    tracker.sign_in("u1").await;
    assert_eq!(tracker.status(), SyncStatus::Synced);
    let coins = tracker.tracked_coins();
    assert_eq!(coins[0].price, 60_000.0);
    assert_eq!(coins[0].progress, Some(0.5));
    assert_eq!(tracker.total_value(), 30_000.0);

    let record = store.record("u1", "bitcoin").unwrap();
    assert_eq!(record.coin.price, 60_000.0);
    assert_eq!(record.created_at, created);
}

#[tokio::test]
async fn test_failed_sign_in_skips_price_refresh() {
    let store = Arc::new(FlakyStore::default());
    store.inner.upsert(RecordPatch::create("u1", btc())).await.unwrap();
    let lookup = MockLookup::new();
    lookup.price_handle().lock().unwrap().insert("bitcoin".into(), 60_000.0);
    let tracker = CoinTracker::with_lookup(Settings::default(), Box::new(lookup), store.clone());

    store.fail_list.store(true, Ordering::SeqCst);
    tracker.sign_in("u1").await;
    assert_eq!(tracker.status(), SyncStatus::Error);
    assert_eq!(store.inner.record("u1", "bitcoin").unwrap().coin.price, 50_000.0);

    store.fail_list.store(false, Ordering::SeqCst);
    tracker.retry().await;
    assert_eq!(tracker.status(), SyncStatus::Synced);
    assert_eq!(tracker.tracked_coins()[0].price, 60_000.0);
    assert_eq!(store.inner.record("u1", "bitcoin").unwrap().coin.price, 60_000.0);
}

#[tokio::test]
async fn test_first_edit_with_zero_target_keeps_holding() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);
    tracker.sign_in("u1").await;
    tracker.select_coin(btc()).await;

    let updated = tracker
        .edit_coin("bitcoin", &CoinEdit::initial("0", "0.5"))
        .await
        .unwrap();
    assert_eq!(updated.progress, Some(0.5));
    assert_eq!(updated.desired_highest_number, None);
    assert_eq!(tracker.total_value(), 25_000.0);
    assert_eq!(tracker.progress_percentage("bitcoin"), Some(0.0));
    assert_eq!(store.record("u1", "bitcoin").unwrap().coin.progress, Some(0.5));
}

#[tokio::test]
async fn test_refresh_prices_with_nothing_tracked() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);
    assert_eq!(tracker.refresh_prices().await, 0);
}

#[tokio::test]
async fn test_chart_helpers() {
    let store = MemoryStore::new();
    let tracker = tracker(&store);

    assert_eq!(tracker.chart_symbol("btcusd"), "BINANCE:BTCUSD");
    assert_eq!(tracker.chart_symbol_for_coin("eth"), "BINANCE:ETHUSD");

    let all = tracker.chart_pairs("").await;
    assert_eq!(all.len(), 3);
    let filtered = tracker.chart_pairs("bitcoin").await;
    let symbols: Vec<&str> = filtered.iter().map(|p| p.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTCUSD", "WBTCUSD"]);
}

#[tokio::test]
async fn test_secondary_currency_rate_from_settings() {
    let store = MemoryStore::new();
    let mut settings = Settings::default();
    settings.secondary_currency.code = "EUR".into();
    settings.secondary_currency.rate = 0.5;
    let tracker = CoinTracker::with_lookup(
        settings,
        Box::new(MockLookup::new()),
        Arc::new(store.clone()),
    );
    tracker.select_coin(btc()).await;
    tracker.edit_coin("bitcoin", &CoinEdit::initial("1", "1")).await;
    assert_eq!(tracker.total_value_secondary(), 25_000.0);
    assert_eq!(tracker.settings().secondary_currency.code, "EUR");
}

// ═══════════════════════════════════════════════════════════════════
// TrackedCoinSynchronizer: failure handling
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_failed_initial_load_is_error_then_retry() {
    let store = Arc::new(FlakyStore::default());
    store.inner.upsert(RecordPatch::create("u1", btc())).await.unwrap();
    let sync = TrackedCoinSynchronizer::new(store.clone());

    store.fail_list.store(true, Ordering::SeqCst);
    sync.on_auth_changed(Some("u1")).await;
    assert_eq!(sync.status(), SyncStatus::Error);
    assert!(sync.tracked_coins().is_empty());
    assert!(!sync.has_active_subscription());

    store.fail_list.store(false, Ordering::SeqCst);
    sync.retry().await;
    assert_eq!(sync.status(), SyncStatus::Synced);
    assert_eq!(ids(&sync.tracked_coins()), vec!["bitcoin"]);
    assert!(sync.has_active_subscription());
}

#[tokio::test]
async fn test_retry_outside_error_is_noop() {
    let store = Arc::new(FlakyStore::default());
    let sync = TrackedCoinSynchronizer::new(store.clone());

    sync.retry().await;
    assert_eq!(sync.status(), SyncStatus::Unauthenticated);

    sync.on_auth_changed(Some("u1")).await;
    sync.retry().await;
    assert_eq!(sync.status(), SyncStatus::Synced);
    assert_eq!(store.inner.subscriber_count("u1"), 1);
}

#[tokio::test]
async fn test_failed_subscribe_is_error() {
    let store = Arc::new(FlakyStore::default());
    let sync = TrackedCoinSynchronizer::new(store.clone());

    store.fail_subscribe.store(true, Ordering::SeqCst);
    sync.on_auth_changed(Some("u1")).await;
    assert_eq!(sync.status(), SyncStatus::Error);
    assert!(!sync.has_active_subscription());
}

#[tokio::test]
async fn test_mutation_in_error_state_restarts_session() {
    let created = Utc::now() - Duration::days(3);
    let stored = PortfolioRecord {
        user_id: "u1".into(),
        coin_id: "bitcoin".into(),
        coin: btc().with_progress(0.5).with_target(2.0),
        created_at: created,
        updated_at: created,
    };
    let store = Arc::new(FlakyStore::over(MemoryStore::from_records(vec![stored])));
    let sync = TrackedCoinSynchronizer::new(store.clone());

    store.fail_list.store(true, Ordering::SeqCst);
    sync.on_auth_changed(Some("u1")).await;
    assert_eq!(sync.status(), SyncStatus::Error);

    store.fail_list.store(false, Ordering::SeqCst);
    let mut fresh = btc();
    fresh.price = 70_000.0;
    assert!(sync.add_coin(fresh).await);

    assert_eq!(sync.status(), SyncStatus::Synced);
    let coins = sync.tracked_coins();
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0].price, 70_000.0);
    assert_eq!(coins[0].progress, Some(0.5));
    assert_eq!(coins[0].desired_highest_number, Some(2.0));
    assert_eq!(store.inner.record("u1", "bitcoin").unwrap().created_at, created);
}

#[tokio::test]
async fn test_failed_write_reconciles_to_store() {
    let store = Arc::new(FlakyStore::default());
    let sync = TrackedCoinSynchronizer::new(store.clone());
    sync.on_auth_changed(Some("u1")).await;

    store.fail_upsert.store(true, Ordering::SeqCst);
    assert!(sync.add_coin(btc()).await);
    assert_eq!(sync.status(), SyncStatus::Synced);
    assert!(sync.tracked_coins().is_empty());
    assert!(store.inner.records().is_empty());
}

#[tokio::test]
async fn test_failed_remove_reconciles_to_store() {
    let store = Arc::new(FlakyStore::default());
    let sync = TrackedCoinSynchronizer::new(store.clone());
    sync.on_auth_changed(Some("u1")).await;
    sync.add_coin(btc()).await;

    store.fail_remove.store(true, Ordering::SeqCst);
    assert!(sync.delete_coin("bitcoin").await);
    assert_eq!(ids(&sync.tracked_coins()), vec!["bitcoin"]);
}

#[tokio::test]
async fn test_failed_refresh_keeps_local_set() {
    let store = Arc::new(FlakyStore::default());
    let sync = TrackedCoinSynchronizer::new(store.clone());
    sync.on_auth_changed(Some("u1")).await;
    sync.add_coin(btc()).await;

    store.fail_list.store(true, Ordering::SeqCst);
    let updated = sync
        .edit_coin("bitcoin", &CoinEdit::initial("2", "1.5"))
        .await
        .unwrap();
    assert_eq!(updated.progress, Some(1.5));
    assert_eq!(sync.status(), SyncStatus::Synced);
    assert_eq!(sync.tracked_coins()[0].progress, Some(1.5));
}

#[tokio::test]
async fn test_failed_existence_check_keeps_created_at() {
    let store = Arc::new(FlakyStore::default());
    let sync = TrackedCoinSynchronizer::new(store.clone());
    sync.on_auth_changed(Some("u1")).await;
    sync.add_coin(btc()).await;
    let created = store.inner.record("u1", "bitcoin").unwrap().created_at;

    store.fail_exists.store(true, Ordering::SeqCst);
    sync.edit_coin("bitcoin", &CoinEdit::initial("2", "1")).await;
    assert_eq!(store.inner.record("u1", "bitcoin").unwrap().created_at, created);
}

#[tokio::test]
async fn test_subscription_error_clears_until_next_push() {
    let store = Arc::new(FlakyStore::default());
    let sync = TrackedCoinSynchronizer::new(store.clone());
    sync.on_auth_changed(Some("u1")).await;
    sync.add_coin(btc()).await;

    store.emit_error();
    assert_eq!(sync.status(), SyncStatus::Error);
    assert!(sync.tracked_coins().is_empty());

    store.inner.upsert(RecordPatch::create("u1", eth())).await.unwrap();
    assert_eq!(sync.status(), SyncStatus::Synced);
    assert_eq!(ids(&sync.tracked_coins()), vec!["bitcoin", "ethereum"]);
}

#[tokio::test]
async fn test_error_from_finished_session_is_ignored() {
    let store = Arc::new(FlakyStore::default());
    let sync = TrackedCoinSynchronizer::new(store.clone());
    sync.on_auth_changed(Some("u1")).await;
    sync.on_auth_changed(None).await;
    assert!(!sync.has_active_subscription());

    store.emit_error();
    assert_eq!(sync.status(), SyncStatus::Unauthenticated);

    sync.on_auth_changed(Some("u2")).await;
    sync.add_coin(eth()).await;
    // One stale u1 listener plus the live u2 listener; only the live one counts.
    store.emit_error();
    assert_eq!(sync.status(), SyncStatus::Error);
    assert_eq!(sync.user_id().as_deref(), Some("u2"));
}

#[tokio::test]
async fn test_user_switch_without_sign_out() {
    let store = Arc::new(FlakyStore::default());
    store.inner.upsert(RecordPatch::create("u1", btc())).await.unwrap();
    store.inner.upsert(RecordPatch::create("u2", eth())).await.unwrap();
    let sync = TrackedCoinSynchronizer::new(store.clone());

    sync.on_auth_changed(Some("u1")).await;
    assert_eq!(ids(&sync.tracked_coins()), vec!["bitcoin"]);

    sync.on_auth_changed(Some("u2")).await;
    assert_eq!(ids(&sync.tracked_coins()), vec!["ethereum"]);
    assert_eq!(store.inner.subscriber_count("u1"), 0);
    assert_eq!(store.inner.subscriber_count("u2"), 1);
    assert!(sync.is_tracked("ethereum"));
    assert!(!sync.is_tracked("bitcoin"));
}
