use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::error::PositionStoreResult;
use crate::model::{AssetPosition, AssetPositionUpsert, Subaccount};
use crate::query::{
    verify_all_required_fields, AssetPositionQueryConfig, Options, QueryableField,
};
use crate::repository::AssetPositionRepository;

const SELECT_COLUMNS: &str =
    "SELECT id, subaccount_id, asset_id, size, is_long FROM asset_positions";

/// PostgreSQL-backed asset position store
///
/// Concurrent upserts for the same pair are serialized by PostgreSQL's row
/// locking on the primary key; no application-level lock is taken.
#[derive(Clone)]
pub struct PgAssetPositionRepository {
    pool: PgPool,
}

impl PgAssetPositionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &AssetPositionQueryConfig) {
    builder.push(" WHERE TRUE");

    if let Some(ids) = &filter.id {
        builder.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if let Some(subaccount_ids) = &filter.subaccount_id {
        builder
            .push(" AND subaccount_id = ANY(")
            .push_bind(subaccount_ids.clone())
            .push(")");
    }
    if let Some(asset_ids) = &filter.asset_id {
        builder
            .push(" AND asset_id = ANY(")
            .push_bind(asset_ids.clone())
            .push(")");
    }
    if let Some(size) = &filter.size {
        builder.push(" AND size = ").push_bind(size.clone());
    }
    if let Some(is_long) = filter.is_long {
        builder.push(" AND is_long = ").push_bind(is_long);
    }
}

fn push_ordering(builder: &mut QueryBuilder<'_, Postgres>, options: &Options) {
    builder.push(" ORDER BY ");
    let mut columns = builder.separated(", ");
    for (column, ordering) in options.effective_order() {
        columns.push(format!("{} {}", column.as_str(), ordering.as_sql()));
    }
}

#[async_trait]
impl AssetPositionRepository for PgAssetPositionRepository {
    async fn upsert(&self, record: AssetPositionUpsert) -> PositionStoreResult<AssetPosition> {
        let position = record.into_position()?;

        let mut tx = self.pool.begin().await?;
        let stored = sqlx::query_as::<_, AssetPosition>(
            r#"
            INSERT INTO asset_positions (id, subaccount_id, asset_id, size, is_long)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                subaccount_id = EXCLUDED.subaccount_id,
                asset_id = EXCLUDED.asset_id,
                size = EXCLUDED.size,
                is_long = EXCLUDED.is_long
            RETURNING id, subaccount_id, asset_id, size, is_long
            "#,
        )
        .bind(position.id)
        .bind(position.subaccount_id)
        .bind(&position.asset_id)
        .bind(&position.size)
        .bind(position.is_long)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(
            at = "asset_position_store#upsert",
            id = %stored.id,
            subaccount_id = %stored.subaccount_id,
            asset_id = %stored.asset_id,
            size = %stored.size,
            is_long = stored.is_long,
            "Asset position upserted"
        );
        Ok(stored)
    }

    async fn find_all(
        &self,
        filter: &AssetPositionQueryConfig,
        required_fields: &[QueryableField],
        options: &Options,
    ) -> PositionStoreResult<Vec<AssetPosition>> {
        verify_all_required_fields(filter, required_fields)?;

        let mut builder = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        push_filters(&mut builder, filter);
        push_ordering(&mut builder, options);
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let positions = builder
            .build_query_as::<AssetPosition>()
            .fetch_all(&self.pool)
            .await?;
        Ok(positions)
    }

    async fn find_by_id(&self, id: Uuid) -> PositionStoreResult<Option<AssetPosition>> {
        let position =
            sqlx::query_as::<_, AssetPosition>(&format!("{} WHERE id = $1", SELECT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(position)
    }

    async fn ensure_subaccount(&self, subaccount: &Subaccount) -> PositionStoreResult<()> {
        let created = sqlx::query(
            r#"
            INSERT INTO subaccounts (id, address, subaccount_number)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(subaccount.id)
        .bind(&subaccount.address)
        .bind(subaccount.subaccount_number)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if created > 0 {
            debug!(
                at = "asset_position_store#ensure_subaccount",
                id = %subaccount.id,
                address = %subaccount.address,
                subaccount_number = subaccount.subaccount_number,
                "Subaccount created"
            );
        }
        Ok(())
    }

    async fn find_subaccount(&self, id: Uuid) -> PositionStoreResult<Option<Subaccount>> {
        let subaccount = sqlx::query_as::<_, Subaccount>(
            "SELECT id, address, subaccount_number FROM subaccounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subaccount)
    }
}
