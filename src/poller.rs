//! Background reconciliation of pending note transactions.
//!
//! Every pass reads the pending notes, asks the chain indexer about each head
//! transaction that is old enough to have been indexed, and folds the answer
//! back into the store. Placeholder hashes never reach the indexer; they
//! confirm locally after a short delay.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain::{is_placeholder, placeholder_timestamp, ChainIndexer};
use crate::clock::{Clock, SystemClock};
use crate::entity::{Note, TxStatus};
use crate::storage::{Resolution, SharedStore};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay before the first pass after `spawn`.
    pub startup_delay: Duration,
    /// Pause between passes.
    pub interval: Duration,
    /// Transactions younger than this are not looked up yet.
    pub min_tx_age: Duration,
    /// Age at which a placeholder hash is treated as confirmed.
    pub simulated_confirm_after: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(10),
            interval: Duration::from_secs(20),
            min_tx_age: Duration::from_secs(10),
            simulated_confirm_after: Duration::from_secs(20),
        }
    }
}

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Notes whose transaction was looked up (or resolved locally).
    pub checked: usize,
    /// Notes skipped because their transaction is too young.
    pub deferred: usize,
    pub confirmed: usize,
    pub failed: usize,
    /// Notes physically removed after their delete confirmed.
    pub removed: usize,
    pub errors: usize,
}

pub struct ConfirmationPoller {
    store: SharedStore,
    indexer: Arc<dyn ChainIndexer>,
    clock: Arc<dyn Clock>,
    config: PollerConfig,
}

impl ConfirmationPoller {
    pub fn new(store: SharedStore, indexer: Arc<dyn ChainIndexer>) -> Self {
        Self {
            store,
            indexer,
            clock: Arc::new(SystemClock),
            config: PollerConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one reconciliation pass over every pending note.
    pub async fn run_pass(&self) -> PassReport {
        let mut report = PassReport::default();

        let pending = match self.store.lock().await.list_pending() {
            Ok(notes) => notes,
            Err(e) => {
                error!("Could not list pending notes: {}", e);
                report.errors += 1;
                return report;
            }
        };
        if pending.is_empty() {
            return report;
        }
        debug!("Reconciling {} pending notes", pending.len());

        let now = self.clock.now();
        for note in &pending {
            let Some(hash) = note.tx_hash.as_deref() else {
                continue;
            };

            if age(now, submitted_at(note)) < self.config.min_tx_age {
                report.deferred += 1;
                continue;
            }
            report.checked += 1;

            let status = if is_placeholder(hash) {
                let since = placeholder_timestamp(hash).unwrap_or_else(|| submitted_at(note));
                if age(now, since) > self.config.simulated_confirm_after {
                    TxStatus::Confirmed
                } else {
                    TxStatus::Pending
                }
            } else {
                match self.indexer.tx_status(hash).await {
                    Ok(status) => status,
                    Err(e) => {
                        warn!("Lookup of {} for note {} failed, will retry: {}", hash, note.id, e);
                        report.errors += 1;
                        continue;
                    }
                }
            };

            if status == TxStatus::Pending {
                continue;
            }

            let resolution = self
                .store
                .lock()
                .await
                .resolve_transaction(&note.id, hash, status);
            match resolution {
                Ok(Resolution::Removed) => {
                    info!("Delete of note {} confirmed, removed", note.id);
                    report.removed += 1;
                }
                Ok(Resolution::Updated) => {
                    info!("Transaction {} for note {} is {}", hash, note.id, status);
                    match status {
                        TxStatus::Confirmed => report.confirmed += 1,
                        TxStatus::Failed => report.failed += 1,
                        TxStatus::Pending => {}
                    }
                }
                Ok(Resolution::Ignored) => {
                    debug!("Note {} changed during the pass, {} ignored", note.id, hash);
                }
                Err(e) => {
                    error!("Could not record {} for note {}: {}", status, note.id, e);
                    report.errors += 1;
                }
            }
        }

        report
    }

    /// Start the poll loop on the runtime.
    ///
    /// The loop sleeps `startup_delay`, then runs a pass every `interval`
    /// until `cancel` fires. Cancellation is only observed between passes.
    pub fn spawn(self, cancel: CancellationToken) -> PollerHandle {
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            info!(
                "Confirmation poller started (every {}s)",
                self.config.interval.as_secs()
            );

            let mut delay = self.config.startup_delay;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                let report = self.run_pass().await;
                if report != PassReport::default() {
                    debug!("Poll pass finished: {:?}", report);
                }
                delay = self.config.interval;
            }

            info!("Confirmation poller stopped");
        });

        PollerHandle {
            cancel,
            join: Some(join),
        }
    }
}

/// Owner of a running poller task. Dropping the handle cancels the loop
/// without waiting for it.
pub struct PollerHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Cancel the loop and wait for an in-flight pass to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!("Confirmation poller task failed: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// When the note's head transaction was submitted. Legacy records without
/// history fall back to the last modification time.
fn submitted_at(note: &Note) -> DateTime<Utc> {
    note.latest_transaction()
        .map(|tx| tx.timestamp)
        .unwrap_or(note.updated_at)
}

fn age(now: DateTime<Utc>, since: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{placeholder_hash, ChainError};
    use crate::clock::ManualClock;
    use crate::entity::TxAction;
    use crate::storage::{shared, MemoryBlobStore, NewNote, NoteStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Indexer answering from a fixed table; unknown hashes are not indexed.
    #[derive(Default)]
    struct TableIndexer {
        answers: Mutex<HashMap<String, Result<TxStatus, ChainError>>>,
        calls: AtomicUsize,
    }

    impl TableIndexer {
        fn answer(&self, hash: &str, result: Result<TxStatus, ChainError>) {
            self.answers.lock().unwrap().insert(hash.to_string(), result);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChainIndexer for TableIndexer {
        async fn tx_status(&self, hash: &str) -> Result<TxStatus, ChainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .get(hash)
                .cloned()
                .unwrap_or(Ok(TxStatus::Pending))
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        indexer: Arc<TableIndexer>,
        store: SharedStore,
        poller: ConfirmationPoller,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let indexer = Arc::new(TableIndexer::default());
        let store = shared(NoteStore::with_clock(
            Box::new(MemoryBlobStore::new()),
            clock.clone(),
        ));
        let poller = ConfirmationPoller::new(store.clone(), indexer.clone()).with_clock(clock.clone());
        Fixture {
            clock,
            indexer,
            store,
            poller,
        }
    }

    async fn note_with_tx(store: &SharedStore, hash: &str, action: TxAction) -> String {
        let store = store.lock().await;
        let note = store
            .create(NewNote {
                title: "t".to_string(),
                ..Default::default()
            })
            .unwrap();
        store.attach_transaction(&note.id, hash, action).unwrap();
        note.id
    }

    #[test]
    fn test_default_timings() {
        let config = PollerConfig::default();
        assert_eq!(config.startup_delay, Duration::from_secs(10));
        assert_eq!(config.interval, Duration::from_secs(20));
        assert_eq!(config.min_tx_age, Duration::from_secs(10));
        assert_eq!(config.simulated_confirm_after, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_young_transactions_are_not_looked_up() {
        let f = fixture();
        note_with_tx(&f.store, "h1", TxAction::Create).await;
        f.clock.advance(chrono::Duration::seconds(5));

        let report = f.poller.run_pass().await;
        assert_eq!(report.deferred, 1);
        assert_eq!(report.checked, 0);
        assert_eq!(f.indexer.calls(), 0);
    }

    #[tokio::test]
    async fn test_confirmation_is_recorded() {
        let f = fixture();
        let id = note_with_tx(&f.store, "h1", TxAction::Create).await;
        f.indexer.answer("h1", Ok(TxStatus::Confirmed));
        f.clock.advance(chrono::Duration::seconds(11));

        let report = f.poller.run_pass().await;
        assert_eq!(report.confirmed, 1);

        let note = f.store.lock().await.get(&id).unwrap().unwrap();
        assert_eq!(note.status, TxStatus::Confirmed);
        assert_eq!(note.transactions[0].status, TxStatus::Confirmed);
        assert!(f.store.lock().await.list_pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_errors_are_isolated() {
        let f = fixture();
        let broken = note_with_tx(&f.store, "h-broken", TxAction::Create).await;
        let fine = note_with_tx(&f.store, "h-fine", TxAction::Create).await;
        f.indexer
            .answer("h-broken", Err(ChainError::Transport("timeout".to_string())));
        f.indexer.answer("h-fine", Ok(TxStatus::Failed));
        f.clock.advance(chrono::Duration::seconds(11));

        let report = f.poller.run_pass().await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.failed, 1);

        let store = f.store.lock().await;
        assert_eq!(store.get(&broken).unwrap().unwrap().status, TxStatus::Pending);
        assert_eq!(store.get(&fine).unwrap().unwrap().status, TxStatus::Failed);
    }

    #[tokio::test]
    async fn test_placeholder_confirms_without_indexer() {
        let f = fixture();
        let hash = placeholder_hash(f.clock.now());
        let id = note_with_tx(&f.store, &hash, TxAction::Create).await;

        f.clock.advance(chrono::Duration::seconds(15));
        let report = f.poller.run_pass().await;
        assert_eq!(report.checked, 1);
        assert_eq!(report.confirmed, 0);

        f.clock.advance(chrono::Duration::seconds(10));
        let report = f.poller.run_pass().await;
        assert_eq!(report.confirmed, 1);
        assert_eq!(f.indexer.calls(), 0);
        assert_eq!(
            f.store.lock().await.get(&id).unwrap().unwrap().status,
            TxStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn test_confirmed_delete_removes_note() {
        let f = fixture();
        let id = note_with_tx(&f.store, "hd", TxAction::Delete).await;
        f.store.lock().await.mark_pending_delete(&id).unwrap();
        f.indexer.answer("hd", Ok(TxStatus::Confirmed));
        f.clock.advance(chrono::Duration::seconds(30));

        let report = f.poller.run_pass().await;
        assert_eq!(report.removed, 1);
        assert!(f.store.lock().await.get(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spawned_poller_runs_and_stops() {
        let f = fixture();
        let id = note_with_tx(&f.store, "h1", TxAction::Create).await;
        f.indexer.answer("h1", Ok(TxStatus::Confirmed));
        f.clock.advance(chrono::Duration::seconds(11));

        let config = PollerConfig {
            startup_delay: Duration::from_millis(10),
            interval: Duration::from_millis(20),
            ..PollerConfig::default()
        };
        let handle = f.poller.with_config(config).spawn(CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.stop().await;

        assert_eq!(
            f.store.lock().await.get(&id).unwrap().unwrap().status,
            TxStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn test_dropped_handle_cancels_loop() {
        let f = fixture();
        note_with_tx(&f.store, "h1", TxAction::Create).await;
        f.clock.advance(chrono::Duration::seconds(11));

        let config = PollerConfig {
            startup_delay: Duration::from_millis(5),
            interval: Duration::from_millis(5),
            ..PollerConfig::default()
        };
        let token = CancellationToken::new();
        let handle = f.poller.with_config(config).spawn(token.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;

        drop(handle);
        assert!(token.is_cancelled());

        // Let an in-flight pass finish, then the count must stay put.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let calls = f.indexer.calls();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.indexer.calls(), calls);
    }
}
