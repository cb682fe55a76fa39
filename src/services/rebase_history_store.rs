//! Rebase history store
//!
//! Append-only ledger of completed cycles. Entries are never updated or
//! deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

use crate::entities::{prelude::*, rebase_history};
use crate::models::rebase_history::{NewRebaseHistoryEntry, RebaseHistoryEntry};
use crate::services::last_rebase_store::StoreError;

#[async_trait]
pub trait RebaseHistoryStore: Send + Sync {
    async fn append(&self, entry: NewRebaseHistoryEntry) -> Result<RebaseHistoryEntry, StoreError>;

    /// Most recent entry by date, ties broken by id
    async fn latest(&self) -> Result<Option<RebaseHistoryEntry>, StoreError>;
}

/// RebaseHistoryStore backed by the rebase_history table
pub struct DbRebaseHistoryStore {
    db: DatabaseConnection,
}

impl DbRebaseHistoryStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RebaseHistoryStore for DbRebaseHistoryStore {
    async fn append(&self, entry: NewRebaseHistoryEntry) -> Result<RebaseHistoryEntry, StoreError> {
        let record = rebase_history::ActiveModel {
            usd_price: Set(Some(entry.usd_price)),
            cpi_value: Set(Some(entry.cpi_value)),
            total_supply: Set(Some(entry.total_supply)),
            date: Set(Some(entry.date.naive_utc())),
            raised: Set(entry.raised),
            ..Default::default()
        };

        let inserted = record.insert(&self.db).await.map_err(|e| {
            StoreError::DatabaseError(format!("Failed to insert rebase_history: {}", e))
        })?;

        tracing::debug!(id = inserted.id, raised = ?inserted.raised, "Appended rebase history entry");

        entry_from_model(inserted)
    }

    async fn latest(&self) -> Result<Option<RebaseHistoryEntry>, StoreError> {
        RebaseHistory::find()
            .order_by_desc(rebase_history::Column::Date)
            .order_by_desc(rebase_history::Column::Id)
            .one(&self.db)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Failed to query rebase_history: {}", e)))?
            .map(entry_from_model)
            .transpose()
    }
}

fn entry_from_model(model: rebase_history::Model) -> Result<RebaseHistoryEntry, StoreError> {
    let id = model.id;
    let missing =
        |column: &str| StoreError::CorruptRecord(format!("rebase_history {} has NULL {}", id, column));

    Ok(RebaseHistoryEntry {
        id,
        usd_price: model.usd_price.ok_or_else(|| missing("usd_price"))?,
        cpi_value: model.cpi_value.ok_or_else(|| missing("cpi_value"))?,
        total_supply: model.total_supply.ok_or_else(|| missing("total_supply"))?,
        date: model
            .date
            .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
            .ok_or_else(|| missing("date"))?,
        raised: model.raised,
    })
}
