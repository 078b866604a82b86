use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::PositionStoreResult;
use crate::ids::USDC_ASSET_ID;
use crate::model::{AssetPosition, AssetPositionUpsert, Subaccount};
use crate::netting::net_signed_sizes;
use crate::query::{AssetPositionQueryConfig, Options, QueryableField};

/// Storage for asset positions
///
/// Implementations key rows by the derived id, so replaying an upsert for the
/// same `(subaccount_id, asset_id)` rewrites one row and never adds another.
#[async_trait]
pub trait AssetPositionRepository: Send + Sync {
    /// Insert the row or replace size and side of the existing one
    ///
    /// Last write wins; sizes are replaced, not added.
    async fn upsert(&self, record: AssetPositionUpsert) -> PositionStoreResult<AssetPosition>;

    /// Rows matching `filter`, ordered per `options` (default `asset_id ASC`)
    async fn find_all(
        &self,
        filter: &AssetPositionQueryConfig,
        required_fields: &[QueryableField],
        options: &Options,
    ) -> PositionStoreResult<Vec<AssetPosition>>;

    async fn find_by_id(&self, id: Uuid) -> PositionStoreResult<Option<AssetPosition>>;

    /// Create the subaccount row unless it already exists; an existing row is
    /// left as is
    async fn ensure_subaccount(&self, subaccount: &Subaccount) -> PositionStoreResult<()>;

    async fn find_subaccount(&self, id: Uuid) -> PositionStoreResult<Option<Subaccount>>;

    /// Signed USDC balance per subaccount; subaccounts without a USDC row are
    /// absent from the map
    async fn find_usdc_net_positions(
        &self,
        subaccount_ids: &[Uuid],
    ) -> PositionStoreResult<HashMap<Uuid, BigDecimal>> {
        if subaccount_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let filter = AssetPositionQueryConfig {
            subaccount_id: Some(subaccount_ids.to_vec()),
            asset_id: Some(vec![USDC_ASSET_ID.to_string()]),
            ..Default::default()
        };
        let positions = self
            .find_all(
                &filter,
                &[QueryableField::SubaccountId, QueryableField::AssetId],
                &Options::default(),
            )
            .await?;

        Ok(net_signed_sizes(&positions))
    }
}
