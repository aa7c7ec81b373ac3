//! Gas price estimation for outgoing EVM transactions.
//!
//! An estimator decides which fee to attach to a transaction and how to bump
//! that fee when the transaction is stuck. Two strategies are provided:
//! [`FixedPriceEstimator`] derives every price from configuration, and
//! [`SuggestedPriceEstimator`] serves a cached `eth_gasPrice` value that a
//! background task keeps fresh.

#![deny(clippy::unwrap_used, clippy::panic)]
#![deny(clippy::arithmetic_side_effects)]

pub use config::{
    ConfigError, ConfigResult, EstimatorMode, GasConfig, GasEstimatorConf, SuggestedPriceSettings,
};
pub use error::{BumpError, ErrorClass, GasEstimatorError, GasEstimatorResult};
pub use estimator::bump::BumpPolicy;
pub use estimator::fixed_price::FixedPriceEstimator;
pub use estimator::lifecycle::EstimatorState;
pub use estimator::suggested_price::SuggestedPriceEstimator;
pub use estimator::{build_estimator, GasEstimator};
pub use metrics::EstimatorMetrics;
pub use rpc::{GasPriceRpc, RpcError};
pub use types::{ChainHead, DynamicFee, EstimatorOpt, GasLimit, GasPrice};

mod config;
mod error;
mod estimator;
mod metrics;
mod rpc;
mod types;
mod utils;
