//! In-process store implementations
//!
//! Nothing survives the process; these exercise the cycle without a database.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::models::rebase_history::{NewRebaseHistoryEntry, RebaseHistoryEntry};
use crate::services::last_rebase_store::{LastRebaseStore, StoreError};
use crate::services::rebase_history_store::RebaseHistoryStore;

#[derive(Default)]
pub struct MemoryLastRebaseStore {
    seconds: RwLock<Option<u64>>,
}

impl MemoryLastRebaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seconds(seconds: u64) -> Self {
        Self {
            seconds: RwLock::new(Some(seconds)),
        }
    }
}

#[async_trait]
impl LastRebaseStore for MemoryLastRebaseStore {
    async fn get(&self) -> Result<Option<u64>, StoreError> {
        Ok(*self.seconds.read())
    }

    async fn set(&self, seconds: u64) -> Result<(), StoreError> {
        *self.seconds.write() = Some(seconds);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRebaseHistoryStore {
    entries: RwLock<Vec<RebaseHistoryEntry>>,
}

impl MemoryRebaseHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in insertion order
    pub fn entries(&self) -> Vec<RebaseHistoryEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl RebaseHistoryStore for MemoryRebaseHistoryStore {
    async fn append(&self, entry: NewRebaseHistoryEntry) -> Result<RebaseHistoryEntry, StoreError> {
        let mut entries = self.entries.write();
        let id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;

        let stored = RebaseHistoryEntry {
            id,
            usd_price: entry.usd_price,
            cpi_value: entry.cpi_value,
            total_supply: entry.total_supply,
            date: entry.date,
            raised: entry.raised,
        };
        entries.push(stored.clone());

        Ok(stored)
    }

    async fn latest(&self) -> Result<Option<RebaseHistoryEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .iter()
            .max_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn new_entry(total_supply: rust_decimal::Decimal, age_secs: i64) -> NewRebaseHistoryEntry {
        NewRebaseHistoryEntry {
            usd_price: dec!(1),
            cpi_value: dec!(1),
            total_supply,
            date: Utc::now() - Duration::seconds(age_secs),
            raised: None,
        }
    }

    #[tokio::test]
    async fn test_last_rebase_round_trip() {
        let store = MemoryLastRebaseStore::new();
        assert_eq!(store.get().await.unwrap(), None);

        store.set(12_345).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(12_345));
    }

    #[tokio::test]
    async fn test_latest_orders_by_date() {
        let store = MemoryRebaseHistoryStore::new();
        assert!(store.latest().await.unwrap().is_none());

        store.append(new_entry(dec!(100), 10)).await.unwrap();
        // Appended later but dated earlier
        store.append(new_entry(dec!(50), 100)).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.id, 1);
        assert_eq!(latest.total_supply, dec!(100));
        assert_eq!(store.entries().len(), 2);
    }
}
