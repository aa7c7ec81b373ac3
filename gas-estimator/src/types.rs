use ethers_core::types::{Block, H256, U256};

/// Price per unit of gas, in wei.
pub type GasPrice = U256;

/// Number of gas units a transaction may consume.
pub type GasLimit = u64;

/// The head of the canonical chain, as announced to estimators.
pub type ChainHead = Block<H256>;

/// EIP-1559 fee pair.
///
/// `fee_cap >= tip_cap` is expected by the network but is not enforced on
/// construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DynamicFee {
    /// `max_fee_per_gas`
    pub fee_cap: GasPrice,
    /// `max_priority_fee_per_gas`
    pub tip_cap: GasPrice,
}

impl DynamicFee {
    pub fn new(fee_cap: GasPrice, tip_cap: GasPrice) -> Self {
        Self { fee_cap, tip_cap }
    }
}

/// Flags accepted by [`crate::GasEstimator::get_legacy_gas`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EstimatorOpt {
    /// Refresh the price from the network before answering. Estimators that
    /// do not cache a remote price ignore it.
    ForceRefetch,
}
