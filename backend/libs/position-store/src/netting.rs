use bigdecimal::{BigDecimal, Zero};
use std::collections::HashMap;
use uuid::Uuid;

use crate::model::AssetPosition;

/// Fold positions into one signed balance per subaccount
///
/// Long rows add their size, short rows subtract it. Subaccounts without rows
/// are absent from the result; callers read absence as zero.
pub fn net_signed_sizes<'a>(
    positions: impl IntoIterator<Item = &'a AssetPosition>,
) -> HashMap<Uuid, BigDecimal> {
    positions
        .into_iter()
        .fold(HashMap::new(), |mut net, position| {
            *net.entry(position.subaccount_id).or_insert_with(BigDecimal::zero) +=
                position.signed_size();
            net
        })
}
