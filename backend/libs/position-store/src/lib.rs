//! # Asset position store
//!
//! One row per `(subaccount, asset)` pair, written with upsert semantics and
//! read back with filters or as netted USDC balances.
//!
//! ## Idempotence
//!
//! The primary key is derived, not generated:
//!
//! ```text
//! id = uuid_v5(NAMESPACE, "{subaccount_id}-{asset_id}")
//! ```
//!
//! so a redelivered message rewrites the row it already wrote. Upserts replace
//! `size` and `is_long` wholesale (last write wins).
//!
//! ## Numbers
//!
//! Sizes are `bigdecimal::BigDecimal` end to end (unbounded PostgreSQL
//! `NUMERIC`, strings in JSON). Nothing here rounds or touches floating point.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bigdecimal::BigDecimal;
//! use position_store::{AssetPositionRepository, AssetPositionUpsert, PgAssetPositionRepository};
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool, subaccount_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! position_store::migrate(&pool).await?;
//! let store = PgAssetPositionRepository::new(pool);
//!
//! store
//!     .upsert(AssetPositionUpsert::new(subaccount_id, "0", BigDecimal::from(10), true))
//!     .await?;
//! let balances = store.find_usdc_net_positions(&[subaccount_id]).await?;
//! # Ok(())
//! # }
//! ```

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

mod error;
mod ids;
mod memory;
mod model;
mod netting;
mod postgres;
mod query;
mod repository;

pub use error::{PositionStoreError, PositionStoreResult};
pub use ids::{asset_position_uuid, subaccount_uuid, NAMESPACE, USDC_ASSET_ID};
pub use memory::InMemoryAssetPositionRepository;
pub use model::{AssetPosition, AssetPositionColumn, AssetPositionUpsert, Subaccount};
pub use netting::net_signed_sizes;
pub use postgres::PgAssetPositionRepository;
pub use query::{
    verify_all_required_fields, AssetPositionQueryConfig, Options, Ordering, QueryableField,
};
pub use repository::AssetPositionRepository;

/// Schema for assets, subaccounts and asset positions
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply pending migrations
pub async fn migrate(pool: &PgPool) -> PositionStoreResult<()> {
    MIGRATOR.run(pool).await?;
    info!(at = "position_store#migrate", "Database migrations completed successfully");
    Ok(())
}
