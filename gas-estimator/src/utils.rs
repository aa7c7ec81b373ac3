use std::time::Duration;

use rand::Rng;

use crate::types::GasLimit;

/// Fraction of the base period by which [`with_jitter`] may deviate.
const JITTER_FRACTION: f64 = 0.1;

/// Scales a gas limit by `multiplier`, rounding to the nearest unit.
///
/// Float to int casts saturate, so absurd multipliers cap at `u64::MAX`.
pub(crate) fn apply_multiplier(gas_limit: GasLimit, multiplier: f64) -> GasLimit {
    (gas_limit as f64 * multiplier).round() as GasLimit
}

/// Returns `period` perturbed by a uniformly random amount of up to ±10%.
pub(crate) fn with_jitter(period: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range((1.0 - JITTER_FRACTION)..=(1.0 + JITTER_FRACTION));
    period.mul_f64(factor)
}
