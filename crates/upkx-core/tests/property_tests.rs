//! Property-based tests for limit normalization and path validation.
//!
//! These tests use proptest to generate arbitrary inputs and verify
//! security properties hold across a wide range of cases.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use upkx_core::ExtractionLimits;
use upkx_core::SafePath;
use upkx_core::security::bomb::validate_compression_ratio;

fn limit_value() -> impl Strategy<Value = u64> {
    prop_oneof![
        Just(0u64),
        1u64..=1024,
        1u64..=ExtractionLimits::CEILING_MAX_PACKAGE_BYTES,
        any::<u64>(),
    ]
}

proptest! {
    /// Normalizing twice is the same as normalizing once.
    #[test]
    fn prop_normalize_idempotent(
        asset in limit_value(),
        package in limit_value(),
        count in limit_value(),
    ) {
        let limits = ExtractionLimits {
            max_asset_bytes: asset,
            max_package_bytes: package,
            max_assets: count,
        };
        let once = limits.normalize();
        prop_assert_eq!(once, once.normalize());
    }

    /// Normalized limits are in range and keep the package limit above the
    /// asset limit.
    #[test]
    fn prop_normalized_limits_valid(
        asset in limit_value(),
        package in limit_value(),
        count in limit_value(),
    ) {
        let limits = ExtractionLimits {
            max_asset_bytes: asset,
            max_package_bytes: package,
            max_assets: count,
        }
        .normalize();

        prop_assert!(limits.max_asset_bytes > 0);
        prop_assert!(limits.max_asset_bytes <= ExtractionLimits::CEILING_MAX_ASSET_BYTES);
        prop_assert!(limits.max_package_bytes <= ExtractionLimits::CEILING_MAX_PACKAGE_BYTES);
        prop_assert!(limits.max_package_bytes >= limits.max_asset_bytes);
        prop_assert!(limits.max_assets > 0);
        prop_assert!(limits.max_assets <= ExtractionLimits::CEILING_MAX_ASSETS);
    }

    /// In-range values survive normalization untouched.
    #[test]
    fn prop_in_range_values_kept(
        asset in 1u64..=ExtractionLimits::CEILING_MAX_ASSET_BYTES,
        count in 1u64..=ExtractionLimits::CEILING_MAX_ASSETS,
    ) {
        let limits = ExtractionLimits {
            max_asset_bytes: asset,
            max_package_bytes: ExtractionLimits::CEILING_MAX_PACKAGE_BYTES,
            max_assets: count,
        }
        .normalize();
        prop_assert_eq!(limits.max_asset_bytes, asset);
        prop_assert_eq!(limits.max_assets, count);
    }

    /// Any pathname with a `..` component is rejected.
    #[test]
    fn prop_parent_traversal_rejected(
        prefix in "([a-z]+/){0,5}",
        suffix in "([a-z]+/?){0,5}",
        backslash in any::<bool>(),
    ) {
        let mut raw = format!("{prefix}../{suffix}");
        if backslash {
            raw = raw.replace('/', "\\");
        }
        prop_assert!(SafePath::from_pathname(&raw).is_err());
    }

    /// Plain relative pathnames are accepted and keep their components.
    #[test]
    fn prop_valid_relative_paths_accepted(
        components in prop::collection::vec("[a-zA-Z0-9_ -]{1,20}", 1..8)
    ) {
        let raw = components.join("/");
        let path = SafePath::from_pathname(&raw).unwrap();
        let kept: Vec<&str> = path.components().collect();
        let expected: Vec<&str> = components.iter().map(String::as_str).collect();
        prop_assert_eq!(kept, expected);
    }

    /// Rooted pathnames are rejected.
    #[test]
    fn prop_rooted_rejected(rest in "[a-z]{1,10}(/[a-z]{1,10}){0,3}") {
        let unix_rooted = format!("/{rest}");
        let drive_rooted = format!("C:/{rest}");
        prop_assert!(SafePath::from_pathname(&unix_rooted).is_err());
        prop_assert!(SafePath::from_pathname(&drive_rooted).is_err());
    }

    /// Output below the 1 MiB floor is never a bomb.
    #[test]
    fn prop_small_output_never_bomb(
        compressed in 1u64..1024,
        decompressed in 0u64..(1024 * 1024),
    ) {
        prop_assert!(validate_compression_ratio(compressed, decompressed, 100.0).is_ok());
    }
}
