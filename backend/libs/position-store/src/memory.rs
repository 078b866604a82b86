use async_trait::async_trait;
use std::cmp;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::PositionStoreResult;
use crate::model::{AssetPosition, AssetPositionColumn, AssetPositionUpsert, Subaccount};
use crate::query::{
    verify_all_required_fields, AssetPositionQueryConfig, Options, Ordering, QueryableField,
};
use crate::repository::AssetPositionRepository;

/// In-process asset position store
///
/// Same filter, ordering and upsert semantics as the PostgreSQL store, minus
/// foreign keys. Used by tests and local runs without a database.
#[derive(Debug, Default)]
pub struct InMemoryAssetPositionRepository {
    rows: RwLock<HashMap<Uuid, AssetPosition>>,
    subaccounts: RwLock<HashMap<Uuid, Subaccount>>,
}

impl InMemoryAssetPositionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn compare(a: &AssetPosition, b: &AssetPosition, column: AssetPositionColumn) -> cmp::Ordering {
    match column {
        AssetPositionColumn::Id => a.id.cmp(&b.id),
        AssetPositionColumn::SubaccountId => a.subaccount_id.cmp(&b.subaccount_id),
        AssetPositionColumn::AssetId => a.asset_id.cmp(&b.asset_id),
        AssetPositionColumn::Size => a.size.cmp(&b.size),
        AssetPositionColumn::IsLong => a.is_long.cmp(&b.is_long),
    }
}

#[async_trait]
impl AssetPositionRepository for InMemoryAssetPositionRepository {
    async fn upsert(&self, record: AssetPositionUpsert) -> PositionStoreResult<AssetPosition> {
        let position = record.into_position()?;
        self.rows
            .write()
            .await
            .insert(position.id, position.clone());
        Ok(position)
    }

    async fn find_all(
        &self,
        filter: &AssetPositionQueryConfig,
        required_fields: &[QueryableField],
        options: &Options,
    ) -> PositionStoreResult<Vec<AssetPosition>> {
        verify_all_required_fields(filter, required_fields)?;

        let mut positions: Vec<AssetPosition> = self
            .rows
            .read()
            .await
            .values()
            .filter(|position| filter.matches(position))
            .cloned()
            .collect();

        let order = options.effective_order();
        positions.sort_by(|a, b| {
            order
                .iter()
                .map(|(column, ordering)| match ordering {
                    Ordering::Asc => compare(a, b, *column),
                    Ordering::Desc => compare(b, a, *column),
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(cmp::Ordering::Equal)
        });

        if let Some(limit) = filter.limit {
            positions.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(positions)
    }

    async fn find_by_id(&self, id: Uuid) -> PositionStoreResult<Option<AssetPosition>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn ensure_subaccount(&self, subaccount: &Subaccount) -> PositionStoreResult<()> {
        self.subaccounts
            .write()
            .await
            .entry(subaccount.id)
            .or_insert_with(|| subaccount.clone());
        Ok(())
    }

    async fn find_subaccount(&self, id: Uuid) -> PositionStoreResult<Option<Subaccount>> {
        Ok(self.subaccounts.read().await.get(&id).cloned())
    }
}
