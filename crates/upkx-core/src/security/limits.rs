//! Extraction limit enforcement.
//!
//! [`LimitEnforcer`] is a stateless gate over normalized
//! [`ExtractionLimits`]. [`PackageBudget`] carries the running totals a job
//! feeds through the gate.

use crate::ExtractionError;
use crate::ExtractionLimits;
use crate::Result;
use crate::error::LimitKind;

/// Stateless limit gate.
#[derive(Debug, Clone, Copy)]
pub struct LimitEnforcer {
    limits: ExtractionLimits,
}

impl LimitEnforcer {
    /// Creates a gate over `limits`, normalizing them first.
    #[must_use]
    pub fn new(limits: ExtractionLimits) -> Self {
        Self {
            limits: limits.normalize(),
        }
    }

    /// Returns the normalized limits in force.
    #[must_use]
    pub const fn limits(&self) -> &ExtractionLimits {
        &self.limits
    }

    /// Checks a single asset's size.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded(AssetBytes)` if `size > max_asset_bytes`.
    pub fn check_asset_bytes(&self, size: u64) -> Result<()> {
        Self::check(LimitKind::AssetBytes, self.limits.max_asset_bytes, size)
    }

    /// Checks the running package total.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded(PackageBytes)` if `total > max_package_bytes`.
    pub fn check_package_bytes(&self, total: u64) -> Result<()> {
        Self::check(LimitKind::PackageBytes, self.limits.max_package_bytes, total)
    }

    /// Checks the running asset count.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded(AssetCount)` if `count > max_assets`.
    pub fn check_asset_count(&self, count: u64) -> Result<()> {
        Self::check(LimitKind::AssetCount, self.limits.max_assets, count)
    }

    fn check(kind: LimitKind, limit: u64, actual: u64) -> Result<()> {
        if actual > limit {
            return Err(ExtractionError::limit(kind, limit, actual));
        }
        Ok(())
    }
}

/// Running totals of one extraction job.
///
/// Every reservation is checked before it is recorded, so a failed
/// reservation leaves the budget unchanged.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PackageBudget {
    assets: u64,
    bytes: u64,
}

impl PackageBudget {
    /// Creates an empty budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves room for one asset of `size` bytes.
    ///
    /// Checks, in order: asset size, asset count, package total.
    ///
    /// # Errors
    ///
    /// Returns the first breached limit. Arithmetic overflow is reported as
    /// the corresponding limit with `actual = u64::MAX`.
    pub fn reserve(&mut self, size: u64, gate: &LimitEnforcer) -> Result<()> {
        self.reserve_with_sidecars(size, 0, gate)
    }

    /// Like [`reserve`](Self::reserve), but also charges `sidecars` bytes
    /// (the `.meta` file written next to the asset) to the package total.
    /// Only `size` is held against the per-asset limit.
    ///
    /// # Errors
    ///
    /// Returns the first breached limit.
    pub fn reserve_with_sidecars(
        &mut self,
        size: u64,
        sidecars: u64,
        gate: &LimitEnforcer,
    ) -> Result<()> {
        gate.check_asset_bytes(size)?;

        let assets = self.assets.checked_add(1).unwrap_or(u64::MAX);
        gate.check_asset_count(assets)?;

        let bytes = self
            .bytes
            .checked_add(size)
            .and_then(|b| b.checked_add(sidecars))
            .unwrap_or(u64::MAX);
        gate.check_package_bytes(bytes)?;

        self.assets = assets;
        self.bytes = bytes;
        Ok(())
    }

    /// Charges `bytes` to the package total without counting an asset.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded(PackageBytes)` if the new total breaches the
    /// package limit; the budget is left unchanged.
    pub fn charge(&mut self, bytes: u64, gate: &LimitEnforcer) -> Result<()> {
        let total = self.bytes.checked_add(bytes).unwrap_or(u64::MAX);
        gate.check_package_bytes(total)?;
        self.bytes = total;
        Ok(())
    }

    /// Number of reserved assets.
    #[must_use]
    pub fn assets(&self) -> u64 {
        self.assets
    }

    /// Number of reserved bytes.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}
