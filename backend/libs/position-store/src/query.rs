use bigdecimal::BigDecimal;
use std::fmt;
use uuid::Uuid;

use crate::error::{PositionStoreError, PositionStoreResult};
use crate::model::{AssetPosition, AssetPositionColumn};

/// Filter fields a caller can mark as mandatory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryableField {
    Id,
    SubaccountId,
    AssetId,
    Size,
    IsLong,
    Limit,
}

impl QueryableField {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryableField::Id => "id",
            QueryableField::SubaccountId => "subaccount_id",
            QueryableField::AssetId => "asset_id",
            QueryableField::Size => "size",
            QueryableField::IsLong => "is_long",
            QueryableField::Limit => "limit",
        }
    }
}

impl fmt::Display for QueryableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset position filter. List fields match any of their values; unset
/// fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetPositionQueryConfig {
    pub id: Option<Vec<Uuid>>,
    pub subaccount_id: Option<Vec<Uuid>>,
    pub asset_id: Option<Vec<String>>,
    pub size: Option<BigDecimal>,
    pub is_long: Option<bool>,
    pub limit: Option<i64>,
}

impl AssetPositionQueryConfig {
    pub fn is_set(&self, field: QueryableField) -> bool {
        match field {
            QueryableField::Id => self.id.is_some(),
            QueryableField::SubaccountId => self.subaccount_id.is_some(),
            QueryableField::AssetId => self.asset_id.is_some(),
            QueryableField::Size => self.size.is_some(),
            QueryableField::IsLong => self.is_long.is_some(),
            QueryableField::Limit => self.limit.is_some(),
        }
    }

    /// Whether `position` passes every predicate (limit aside)
    pub fn matches(&self, position: &AssetPosition) -> bool {
        self.id.as_ref().map_or(true, |ids| ids.contains(&position.id))
            && self
                .subaccount_id
                .as_ref()
                .map_or(true, |ids| ids.contains(&position.subaccount_id))
            && self
                .asset_id
                .as_ref()
                .map_or(true, |ids| ids.contains(&position.asset_id))
            && self.size.as_ref().map_or(true, |size| *size == position.size)
            && self.is_long.map_or(true, |is_long| is_long == position.is_long)
    }
}

/// Reject a filter that leaves any of `required` unset
pub fn verify_all_required_fields(
    config: &AssetPositionQueryConfig,
    required: &[QueryableField],
) -> PositionStoreResult<()> {
    match required.iter().find(|field| !config.is_set(**field)) {
        Some(field) => Err(PositionStoreError::MissingRequiredField(*field)),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Asc,
    Desc,
}

impl Ordering {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Ordering::Asc => "ASC",
            Ordering::Desc => "DESC",
        }
    }
}

/// Read options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Empty means `asset_id ASC`
    pub order_by: Vec<(AssetPositionColumn, Ordering)>,
}

impl Options {
    pub fn order_by(column: AssetPositionColumn, ordering: Ordering) -> Self {
        Self {
            order_by: vec![(column, ordering)],
        }
    }

    pub(crate) fn effective_order(&self) -> Vec<(AssetPositionColumn, Ordering)> {
        if self.order_by.is_empty() {
            vec![(AssetPositionColumn::AssetId, Ordering::Asc)]
        } else {
            self.order_by.clone()
        }
    }
}
