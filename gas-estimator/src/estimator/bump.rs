use derive_new::new;
use ethers_core::types::U256;
use tracing::{debug, warn};

use crate::config::{ConfigResult, GasConfig};
use crate::error::BumpError;
use crate::types::{DynamicFee, GasPrice};

const PERCENT_DENOMINATOR: u32 = 100;

/// How much a stuck transaction's price grows on resubmission.
///
/// A bump raises a price by at least `percent` percent and by at least
/// `increment` wei, whichever is larger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, new)]
pub struct BumpPolicy {
    /// Minimum relative increase, in percent
    pub percent: u16,
    /// Minimum absolute increase, in wei
    pub increment: GasPrice,
}

impl BumpPolicy {
    pub fn from_config(config: &dyn GasConfig) -> ConfigResult<Self> {
        Ok(Self::new(config.gas_bump_percent()?, config.gas_bump_wei()?))
    }

    /// `max(price * (100 + percent) / 100, price + increment)`, saturating.
    pub fn bump(&self, price: GasPrice) -> GasPrice {
        let numerator = U256::from(u32::from(self.percent).saturating_add(PERCENT_DENOMINATOR));
        let by_percentage = price
            .saturating_mul(numerator)
            .div_mod(U256::from(PERCENT_DENOMINATOR))
            .0;
        let by_increment = price.saturating_add(self.increment);
        by_percentage.max(by_increment)
    }

    /// Bumps a legacy gas price.
    ///
    /// The result never drops below `baseline` (unless the baseline itself
    /// exceeds the ceiling) and never exceeds `ceiling`. A price that already
    /// sits at the ceiling cannot be bumped.
    pub fn bump_legacy(
        &self,
        original: GasPrice,
        baseline: GasPrice,
        ceiling: GasPrice,
    ) -> Result<GasPrice, BumpError> {
        if original >= ceiling {
            return Err(BumpError::ExceedsCeiling {
                price: original,
                ceiling,
            });
        }

        let mut bumped = self.bump(original);
        if baseline > ceiling {
            warn!(
                ?baseline,
                ?ceiling,
                "Ignoring baseline gas price that would exceed the ceiling"
            );
        } else {
            bumped = bumped.max(baseline);
        }
        let bumped = bumped.min(ceiling);

        if bumped <= original {
            return Err(BumpError::NotIncreasing { bumped, original });
        }
        debug!(?original, ?bumped, ?ceiling, "Bumped legacy gas price");
        Ok(bumped)
    }

    /// Bumps an EIP-1559 fee pair.
    ///
    /// A tip cap below `default_tip_cap` is replaced by the default instead of
    /// being bumped. The fee cap is bumped from its old value and kept at or
    /// above the new tip cap. Both are clamped to `ceiling`.
    pub fn bump_dynamic(
        &self,
        original: DynamicFee,
        default_tip_cap: GasPrice,
        ceiling: GasPrice,
    ) -> Result<DynamicFee, BumpError> {
        if original.fee_cap >= ceiling {
            return Err(BumpError::ExceedsCeiling {
                price: original.fee_cap,
                ceiling,
            });
        }

        let tip_cap = if original.tip_cap < default_tip_cap {
            default_tip_cap
        } else {
            self.bump(original.tip_cap)
        }
        .min(ceiling);

        let fee_cap = self.bump(original.fee_cap).max(tip_cap).min(ceiling);

        if fee_cap <= original.fee_cap {
            return Err(BumpError::NotIncreasing {
                bumped: fee_cap,
                original: original.fee_cap,
            });
        }

        let bumped = DynamicFee { fee_cap, tip_cap };
        debug!(?original, ?bumped, ?ceiling, "Bumped dynamic fee");
        Ok(bumped)
    }
}
