//! Deterministic row ids
//!
//! Ids are UUIDv5 over the UTF-8 bytes of a `-`-joined composite key in a
//! fixed namespace. Other services derive the same ids independently, so the
//! namespace and key formats must not change.

use uuid::Uuid;

/// Namespace shared by every indexer id derivation
pub const NAMESPACE: Uuid = Uuid::from_u128(0x0f9da948_a6fb_4c45_9edc_4685c3f3317d);

/// Asset id of USDC, the collateral asset
pub const USDC_ASSET_ID: &str = "0";

/// Id of the asset position row for `(subaccount_id, asset_id)`
pub fn asset_position_uuid(subaccount_id: Uuid, asset_id: &str) -> Uuid {
    Uuid::new_v5(
        &NAMESPACE,
        format!("{}-{}", subaccount_id, asset_id).as_bytes(),
    )
}

/// Id of the subaccount row for `(address, subaccount_number)`
pub fn subaccount_uuid(address: &str, subaccount_number: u32) -> Uuid {
    Uuid::new_v5(
        &NAMESPACE,
        format!("{}-{}", address, subaccount_number).as_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_literal() {
        assert_eq!(
            NAMESPACE.to_string(),
            "0f9da948-a6fb-4c45-9edc-4685c3f3317d"
        );
    }

    #[test]
    fn test_asset_position_uuid_is_deterministic() {
        let subaccount_id = subaccount_uuid("dydx1abc", 0);

        let first = asset_position_uuid(subaccount_id, USDC_ASSET_ID);
        let second = asset_position_uuid(subaccount_id, USDC_ASSET_ID);

        assert_eq!(first, second);
        assert_eq!(first.get_version_num(), 5);
        assert_ne!(first, asset_position_uuid(subaccount_id, "1"));
    }

    #[test]
    fn test_uuid_hashes_hyphenated_key() {
        let subaccount_id = subaccount_uuid("dydx1abc", 0);
        let expected = Uuid::new_v5(&NAMESPACE, format!("{subaccount_id}-0").as_bytes());

        assert_eq!(asset_position_uuid(subaccount_id, "0"), expected);
    }

    #[test]
    fn test_subaccount_numbers_are_distinct() {
        assert_ne!(subaccount_uuid("dydx1abc", 0), subaccount_uuid("dydx1abc", 1));
        assert_ne!(subaccount_uuid("dydx1abc", 0), subaccount_uuid("dydx1abd", 0));
    }
}
