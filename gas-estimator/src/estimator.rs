use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use auto_impl::auto_impl;
use tracing::info;

use crate::config::{ConfigError, EstimatorMode, GasConfig, SuggestedPriceSettings};
use crate::error::GasEstimatorResult;
use crate::metrics::EstimatorMetrics;
use crate::rpc::GasPriceRpc;
use crate::types::{ChainHead, DynamicFee, EstimatorOpt, GasLimit, GasPrice};

pub mod bump;
pub mod fixed_price;
pub mod lifecycle;
pub mod suggested_price;

use fixed_price::FixedPriceEstimator;
use suggested_price::SuggestedPriceEstimator;

/// A pricing strategy the transaction manager consults for every transaction
/// it sends or resends.
///
/// Every operation returns the price together with the gas limit the
/// transaction should be sent with. `max_gas_price` is the caller's own
/// ceiling; estimators combine it with the configured global ceiling.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait GasEstimator: Send + Sync + Debug {
    /// Name used in logs and errors
    fn name(&self) -> &'static str;

    /// Starts any background work. Estimators without such work need not
    /// override this.
    async fn start(&self) -> GasEstimatorResult<()> {
        Ok(())
    }

    /// Stops background work and waits for it to exit.
    async fn stop(&self) -> GasEstimatorResult<()> {
        Ok(())
    }

    /// Notifies the estimator of a new canonical head.
    async fn on_new_longest_chain(&self, head: &ChainHead);

    /// Price for a new legacy transaction.
    async fn get_legacy_gas(
        &self,
        calldata: &[u8],
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
        opts: &[EstimatorOpt],
    ) -> GasEstimatorResult<(GasPrice, GasLimit)>;

    /// Higher price for a legacy transaction stuck at `original_gas_price`.
    async fn bump_legacy_gas(
        &self,
        original_gas_price: GasPrice,
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(GasPrice, GasLimit)>;

    /// Fee pair for a new EIP-1559 transaction.
    async fn get_dynamic_fee(
        &self,
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(DynamicFee, GasLimit)>;

    /// Higher fee pair for an EIP-1559 transaction stuck at `original_fee`.
    async fn bump_dynamic_fee(
        &self,
        original_fee: DynamicFee,
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(DynamicFee, GasLimit)>;
}

/// Builds the estimator a chain is configured for.
///
/// `client` is only required by [`EstimatorMode::SuggestedPrice`]. The
/// returned estimator has not been started.
pub fn build_estimator(
    mode: EstimatorMode,
    domain: &str,
    config: Arc<dyn GasConfig>,
    client: Option<Arc<dyn GasPriceRpc>>,
    settings: SuggestedPriceSettings,
    metrics: EstimatorMetrics,
) -> GasEstimatorResult<Arc<dyn GasEstimator>> {
    let estimator: Arc<dyn GasEstimator> = match mode {
        EstimatorMode::FixedPrice => {
            Arc::new(FixedPriceEstimator::new(domain.to_owned(), config, metrics))
        }
        EstimatorMode::SuggestedPrice => {
            let client = client.ok_or(ConfigError::Missing("rpc client"))?;
            Arc::new(SuggestedPriceEstimator::new(
                domain.to_owned(),
                client,
                settings,
                metrics,
            ))
        }
    };
    info!(domain, estimator = estimator.name(), "Built gas estimator");
    Ok(estimator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorClass, GasEstimatorError};
    use crate::tests::{fixed_price_conf, MockNode};

    #[test]
    fn builds_fixed_price_estimator_without_client() {
        let estimator = build_estimator(
            EstimatorMode::FixedPrice,
            "test",
            Arc::new(fixed_price_conf()),
            None,
            SuggestedPriceSettings::default(),
            EstimatorMetrics::dummy_instance(),
        )
        .unwrap();

        assert_eq!(estimator.name(), "FixedPrice");
    }

    #[tokio::test]
    async fn builds_suggested_price_estimator_with_client() {
        let estimator = build_estimator(
            EstimatorMode::SuggestedPrice,
            "test",
            Arc::new(fixed_price_conf()),
            Some(Arc::new(MockNode::new())),
            SuggestedPriceSettings::default(),
            EstimatorMetrics::dummy_instance(),
        )
        .unwrap();

        assert_eq!(estimator.name(), "SuggestedPrice");
        // not started, so nothing is fetched
        let err = estimator
            .get_legacy_gas(&[], 21_000, 100.into(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GasEstimatorError::NotStarted));
    }

    #[test]
    fn suggested_price_without_client_is_a_configuration_error() {
        let err = build_estimator(
            EstimatorMode::SuggestedPrice,
            "test",
            Arc::new(fixed_price_conf()),
            None,
            SuggestedPriceSettings::default(),
            EstimatorMetrics::dummy_instance(),
        )
        .unwrap_err();

        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[tokio::test]
    async fn default_lifecycle_hooks_are_noops() {
        let estimator = FixedPriceEstimator::new(
            "test".to_owned(),
            Arc::new(fixed_price_conf()),
            EstimatorMetrics::dummy_instance(),
        );

        estimator.start().await.unwrap();
        estimator.stop().await.unwrap();
        // still usable after stop
        assert!(estimator
            .get_legacy_gas(&[], 21_000, 1_000_000.into(), &[])
            .await
            .is_ok());
    }
}
