use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{PositionStoreError, PositionStoreResult};
use crate::ids::{asset_position_uuid, subaccount_uuid};

/// A stored asset position. `size` is a magnitude; `is_long` carries the sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssetPosition {
    pub id: Uuid,
    pub subaccount_id: Uuid,
    pub asset_id: String,
    pub size: BigDecimal,
    pub is_long: bool,
}

impl AssetPosition {
    /// `size` if long, `-size` if short
    pub fn signed_size(&self) -> BigDecimal {
        if self.is_long {
            self.size.clone()
        } else {
            -self.size.clone()
        }
    }
}

/// A subaccount row; asset positions reference it by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subaccount {
    pub id: Uuid,
    pub address: String,
    pub subaccount_number: i64,
}

impl Subaccount {
    pub fn new(address: impl Into<String>, subaccount_number: u32) -> Self {
        let address = address.into();
        Self {
            id: subaccount_uuid(&address, subaccount_number),
            address,
            subaccount_number: i64::from(subaccount_number),
        }
    }
}

/// Upsert input; the row id is derived, never supplied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPositionUpsert {
    pub subaccount_id: Uuid,
    pub asset_id: String,
    pub size: BigDecimal,
    pub is_long: bool,
}

impl AssetPositionUpsert {
    pub fn new(
        subaccount_id: Uuid,
        asset_id: impl Into<String>,
        size: BigDecimal,
        is_long: bool,
    ) -> Self {
        Self {
            subaccount_id,
            asset_id: asset_id.into(),
            size,
            is_long,
        }
    }

    pub fn id(&self) -> Uuid {
        asset_position_uuid(self.subaccount_id, &self.asset_id)
    }

    /// Validate and turn into the row that will be written
    pub fn into_position(self) -> PositionStoreResult<AssetPosition> {
        if self.size < BigDecimal::zero() {
            return Err(PositionStoreError::NegativeSize(self.size));
        }

        Ok(AssetPosition {
            id: self.id(),
            subaccount_id: self.subaccount_id,
            asset_id: self.asset_id,
            size: self.size,
            is_long: self.is_long,
        })
    }
}

/// Columns usable for ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetPositionColumn {
    Id,
    SubaccountId,
    AssetId,
    Size,
    IsLong,
}

impl AssetPositionColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetPositionColumn::Id => "id",
            AssetPositionColumn::SubaccountId => "subaccount_id",
            AssetPositionColumn::AssetId => "asset_id",
            AssetPositionColumn::Size => "size",
            AssetPositionColumn::IsLong => "is_long",
        }
    }
}

impl fmt::Display for AssetPositionColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
