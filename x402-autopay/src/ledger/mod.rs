//! Append-only transaction ledger with a capped notification log.
//!
//! The ledger is the single source of truth for spend and duplicate detection:
//! both are derived by scanning the recorded transactions, never kept as counters.
//! It loads eagerly on construction and writes through on every append.

mod records;
mod storage;

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use x402_autopay_core::types::EpochMillis;

pub use records::*;
pub use storage::*;

use crate::{clock::same_month, errors::LedgerError};

/// Storage key of the transaction list.
pub const TRANSACTIONS_KEY: &str = "agent_transactions";
/// Storage key of the notification list.
pub const NOTIFICATIONS_KEY: &str = "agent_notifications";
/// Most notifications kept; the oldest are dropped first.
pub const NOTIFICATION_CAPACITY: usize = 100;

/// Receives advisory notifications.
pub trait NotificationSink {
    fn notify(&self, notification: Notification);
}

pub struct Ledger<S> {
    storage: S,
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    transactions: Vec<TransactionRecord>,
    notifications: VecDeque<Notification>,
}

impl<S: Storage> Ledger<S> {
    /// Load both lists from `storage`.
    ///
    /// Missing, unreadable or corrupted lists start empty instead of failing.
    pub fn open(storage: S) -> Self {
        let transactions: Vec<TransactionRecord> = load_or_empty(&storage, TRANSACTIONS_KEY);
        let notifications =
            VecDeque::from(load_or_empty::<Notification>(&storage, NOTIFICATIONS_KEY));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Ledger loaded with {} transactions and {} notifications",
            transactions.len(),
            notifications.len()
        );

        Ledger {
            storage,
            state: Mutex::new(LedgerState {
                transactions,
                notifications,
            }),
        }
    }

    /// Append a transaction and persist the whole list.
    ///
    /// The stored list is reloaded under the storage lock and merged with this
    /// ledger's entries, so ledgers sharing one storage never drop each other's
    /// appends. The entry stays in the in-memory ledger even when persisting fails;
    /// the next successful write carries it to storage.
    pub fn record(&self, entry: TransactionRecord) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (merged, stored) = self.append(TRANSACTIONS_KEY, &state.transactions, entry);
        state.transactions = merged;
        stored
    }

    /// Append a notification, discarding the oldest beyond capacity.
    pub fn push_notification(&self, notification: Notification) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let local = state.notifications.iter().cloned().collect::<Vec<_>>();
        let (merged, stored) = self.append(NOTIFICATIONS_KEY, &local, notification);
        state.notifications = merged.into();
        stored
    }

    /// Merge `local` into the stored list under `key`, append `entry`, and store it.
    ///
    /// Returns the merged list even when storing failed.
    fn append<T: Entry>(
        &self,
        key: &str,
        local: &[T],
        entry: T,
    ) -> (Vec<T>, Result<(), LedgerError>) {
        let mut merged = None;
        let stored = self.storage.update(key, &mut |current| {
            let list = merge(parse_or_empty(current.as_deref(), key), local, entry.clone());
            let serialized = serde_json::to_string(&list)?;
            merged = Some(list);
            Ok(serialized)
        });

        let merged = merged.unwrap_or_else(|| {
            let mut list = local.to_vec();
            list.push(entry);
            truncate_front(&mut list);
            list
        });
        (merged, stored.map(|_| ()))
    }

    /// Consistent copy of every transaction, oldest first.
    pub fn all(&self) -> Vec<TransactionRecord> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.transactions.clone()
    }

    /// Notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.notifications.iter().cloned().collect()
    }

    pub fn current_month_spend(&self, now_ms: EpochMillis) -> Decimal {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        month_spend(&state.transactions, now_ms)
    }

    pub fn recent_matching(
        &self,
        endpoint: &str,
        amount: Decimal,
        window_ms: i64,
        now_ms: EpochMillis,
    ) -> Vec<TransactionRecord> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        recent_matching(&state.transactions, endpoint, amount, window_ms, now_ms)
            .cloned()
            .collect()
    }
}

impl<S: Storage> NotificationSink for Ledger<S> {
    fn notify(&self, notification: Notification) {
        if let Err(_err) = self.push_notification(notification) {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to persist notification: {_err}");
        }
    }
}

/// Sum of successful payments made in the UTC calendar month containing `now_ms`.
pub fn month_spend(history: &[TransactionRecord], now_ms: EpochMillis) -> Decimal {
    history
        .iter()
        .filter(|tx| {
            tx.status == TransactionStatus::Success && same_month(tx.timestamp_ms, now_ms)
        })
        .map(|tx| tx.amount)
        .sum()
}

/// Records of any status for the same endpoint and amount within `window_ms` before `now_ms`.
pub fn recent_matching<'a>(
    history: &'a [TransactionRecord],
    endpoint: &'a str,
    amount: Decimal,
    window_ms: i64,
    now_ms: EpochMillis,
) -> impl Iterator<Item = &'a TransactionRecord> + 'a {
    history.iter().filter(move |tx| {
        now_ms.saturating_sub(tx.timestamp_ms) < window_ms
            && tx.endpoint == endpoint
            && tx.amount == amount
    })
}

/// A persisted ledger entry, identified by its id.
trait Entry: Clone + Serialize + DeserializeOwned {
    /// Most entries kept; the oldest are dropped first.
    const CAPACITY: Option<usize>;

    fn id(&self) -> &str;
}

impl Entry for TransactionRecord {
    const CAPACITY: Option<usize> = None;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entry for Notification {
    const CAPACITY: Option<usize> = Some(NOTIFICATION_CAPACITY);

    fn id(&self) -> &str {
        &self.id
    }
}

/// Stored entries in order, then local entries storage has not seen, then `entry`.
fn merge<T: Entry>(stored: Vec<T>, local: &[T], entry: T) -> Vec<T> {
    let known = stored.iter().map(|e| e.id().to_string()).collect::<HashSet<_>>();
    let mut merged = stored;
    merged.extend(local.iter().filter(|e| !known.contains(e.id())).cloned());
    merged.push(entry);
    truncate_front(&mut merged);
    merged
}

fn truncate_front<T: Entry>(list: &mut Vec<T>) {
    if let Some(capacity) = T::CAPACITY {
        if list.len() > capacity {
            list.drain(..list.len() - capacity);
        }
    }
}

fn load_or_empty<T: Entry>(storage: &impl Storage, key: &str) -> Vec<T> {
    match storage.load(key) {
        Ok(raw) => parse_or_empty(raw.as_deref(), key),
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to read '{key}', starting empty: {_err}");
            Vec::new()
        }
    }
}

fn parse_or_empty<T: Entry>(raw: Option<&str>, _key: &str) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut list: Vec<T> = serde_json::from_str(raw).unwrap_or_else(|_err| {
        #[cfg(feature = "tracing")]
        tracing::warn!("Corrupted '{_key}', starting empty: {_err}");
        Vec::new()
    });
    truncate_front(&mut list);
    list
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    const NOW: EpochMillis = 1_772_366_400_000; // 2026-03-01T12:00:00Z

    fn tx(
        endpoint: &str,
        amount: Decimal,
        ts: EpochMillis,
        status: TransactionStatus,
    ) -> TransactionRecord {
        TransactionRecord::builder()
            .service("svc")
            .amount(amount)
            .timestamp_ms(ts)
            .endpoint(endpoint)
            .status(status)
            .build()
    }

    #[test]
    fn spend_counts_successes_this_month() {
        let ledger = Ledger::open(MemoryStorage::new());
        ledger
            .record(tx("a", dec!(15.00), NOW, TransactionStatus::Success))
            .unwrap();
        ledger
            .record(tx("a", dec!(5.00), NOW, TransactionStatus::Failed))
            .unwrap();
        // Previous month
        ledger
            .record(tx("b", dec!(99), NOW - 2 * 24 * 3600 * 1000, TransactionStatus::Success))
            .unwrap();

        assert_eq!(ledger.current_month_spend(NOW), dec!(15.00));
        assert_eq!(ledger.all().len(), 3);
    }

    #[test]
    fn matching_window_is_exclusive() {
        let ledger = Ledger::open(MemoryStorage::new());
        ledger
            .record(tx("a", dec!(9.99), NOW - 300_000, TransactionStatus::Failed))
            .unwrap();
        ledger
            .record(tx("a", dec!(9.990), NOW - 299_999, TransactionStatus::Failed))
            .unwrap();

        let matches = ledger.recent_matching("a", dec!(9.99), 300_000, NOW);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].timestamp_ms, NOW - 299_999);
        assert!(ledger.recent_matching("b", dec!(9.99), 300_000, NOW).is_empty());
    }

    #[test]
    fn notifications_are_capped() {
        let ledger = Ledger::open(MemoryStorage::new());
        for i in 0..(NOTIFICATION_CAPACITY as i64 + 5) {
            ledger.notify(Notification::security_alert("alert", json!({ "i": i }), i));
        }
        let notifications = ledger.notifications();
        assert_eq!(notifications.len(), NOTIFICATION_CAPACITY);
        assert_eq!(notifications[0].timestamp_ms, 5);
        assert_eq!(
            notifications.last().unwrap().timestamp_ms,
            NOTIFICATION_CAPACITY as i64 + 4
        );
    }

    #[test]
    fn corrupted_storage_starts_empty() {
        let storage = MemoryStorage::new();
        storage.store(TRANSACTIONS_KEY, "{not json").unwrap();
        storage.store(NOTIFICATIONS_KEY, "[]").unwrap();

        let ledger = Ledger::open(storage.clone());
        assert!(ledger.all().is_empty());

        ledger
            .record(tx("a", dec!(1), NOW, TransactionStatus::Success))
            .unwrap();
        let reopened = Ledger::open(storage);
        assert_eq!(reopened.all().len(), 1);
    }

    #[test]
    fn shared_file_storage_keeps_both_appends() {
        let dir = tempfile::tempdir().unwrap();
        let a = Ledger::open(FileStorage::new(dir.path()).unwrap());
        let b = Ledger::open(FileStorage::new(dir.path()).unwrap());

        a.record(tx("a", dec!(15), NOW, TransactionStatus::Success))
            .unwrap();
        b.record(tx("b", dec!(10), NOW, TransactionStatus::Success))
            .unwrap();

        // b saw a's append while holding the lock
        assert_eq!(b.all().len(), 2);
        assert_eq!(b.current_month_spend(NOW), dec!(25));

        let reopened = Ledger::open(FileStorage::new(dir.path()).unwrap());
        let endpoints = reopened
            .all()
            .into_iter()
            .map(|tx| tx.endpoint)
            .collect::<Vec<_>>();
        assert_eq!(endpoints, vec!["a", "b"]);
        assert_eq!(reopened.current_month_spend(NOW), dec!(25));
    }

    #[test]
    fn shared_memory_storage_merges_notifications() {
        let storage = MemoryStorage::new();
        let a = Ledger::open(storage.clone());
        let b = Ledger::open(storage.clone());

        a.notify(Notification::security_alert("first", json!({}), NOW));
        b.notify(Notification::security_alert("second", json!({}), NOW + 1));
        a.notify(Notification::security_alert("third", json!({}), NOW + 2));

        let titles = Ledger::open(storage)
            .notifications()
            .into_iter()
            .filter_map(|n| n.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn unpersisted_entries_are_written_later() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let ledger = Ledger::open(storage.clone());

        // A directory in place of the data file makes the rename fail
        let data = dir.path().join(format!("{TRANSACTIONS_KEY}.json"));
        std::fs::create_dir(&data).unwrap();
        assert!(
            ledger
                .record(tx("a", dec!(1), NOW, TransactionStatus::Success))
                .is_err()
        );
        assert_eq!(ledger.all().len(), 1);

        std::fs::remove_dir(&data).unwrap();
        ledger
            .record(tx("b", dec!(2), NOW, TransactionStatus::Success))
            .unwrap();
        assert_eq!(Ledger::open(storage).all().len(), 2);
    }
}
