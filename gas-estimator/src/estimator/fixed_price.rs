use std::sync::Arc;

use async_trait::async_trait;
use derive_new::new;
use tracing::{debug, instrument, warn};

use super::bump::BumpPolicy;
use super::GasEstimator;
use crate::config::{ConfigResult, GasConfig};
use crate::error::{BumpError, GasEstimatorError, GasEstimatorResult};
use crate::metrics::EstimatorMetrics;
use crate::types::{ChainHead, DynamicFee, EstimatorOpt, GasLimit, GasPrice};
use crate::utils::apply_multiplier;

const NAME: &str = "FixedPrice";

/// Prices every transaction from configuration alone.
///
/// Holds no state between calls and re-reads the config on every call, so
/// configuration changes apply to the next estimate.
#[derive(Debug, new)]
pub struct FixedPriceEstimator {
    domain: String,
    config: Arc<dyn GasConfig>,
    metrics: EstimatorMetrics,
}

impl FixedPriceEstimator {
    /// The stricter of the caller's and the configured maximum.
    fn ceiling(&self, max_gas_price: GasPrice) -> ConfigResult<GasPrice> {
        Ok(max_gas_price.min(self.config.max_gas_price_wei()?))
    }

    fn adjusted_limit(&self, gas_limit: GasLimit) -> ConfigResult<GasLimit> {
        Ok(apply_multiplier(
            gas_limit,
            self.config.gas_limit_multiplier()?,
        ))
    }

    fn bump_policy(&self) -> ConfigResult<BumpPolicy> {
        BumpPolicy::from_config(self.config.as_ref())
    }

    fn bump_failed(&self, err: BumpError) -> GasEstimatorError {
        if matches!(err, BumpError::ExceedsCeiling { .. }) {
            self.metrics.increment_bump_exceeds_ceiling(&self.domain);
        }
        warn!(domain = %self.domain, error = %err, "Failed to bump gas");
        err.into()
    }
}

#[async_trait]
impl GasEstimator for FixedPriceEstimator {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn on_new_longest_chain(&self, _head: &ChainHead) {}

    #[instrument(skip(self, _calldata, _opts), fields(domain = %self.domain))]
    async fn get_legacy_gas(
        &self,
        _calldata: &[u8],
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
        _opts: &[EstimatorOpt],
    ) -> GasEstimatorResult<(GasPrice, GasLimit)> {
        let gas_limit = self.adjusted_limit(gas_limit)?;
        let default_price = self.config.gas_price_default()?;
        let ceiling = self.ceiling(max_gas_price)?;

        let gas_price = if default_price > ceiling {
            warn!(
                ?default_price,
                ?ceiling,
                "Clamping default gas price to the maximum gas price"
            );
            ceiling
        } else {
            default_price
        };

        debug!(?gas_price, gas_limit, "Estimated legacy gas");
        Ok((gas_price, gas_limit))
    }

    #[instrument(skip(self), fields(domain = %self.domain))]
    async fn bump_legacy_gas(
        &self,
        original_gas_price: GasPrice,
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(GasPrice, GasLimit)> {
        let gas_limit = self.adjusted_limit(gas_limit)?;
        let baseline = self.config.gas_price_default()?;
        let ceiling = self.ceiling(max_gas_price)?;

        let gas_price = self
            .bump_policy()?
            .bump_legacy(original_gas_price, baseline, ceiling)
            .map_err(|err| self.bump_failed(err))?;

        Ok((gas_price, gas_limit))
    }

    #[instrument(skip(self), fields(domain = %self.domain))]
    async fn get_dynamic_fee(
        &self,
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(DynamicFee, GasLimit)> {
        let gas_limit = self.adjusted_limit(gas_limit)?;
        let tip_cap = self.config.gas_tip_cap_default()?;
        let ceiling = self.ceiling(max_gas_price)?;

        // Without bumping an underpriced fee cap can never be raised, so
        // start at the maximum instead.
        let fee_cap = if self.config.gas_bump_threshold()? == 0 {
            ceiling
        } else {
            self.config.gas_fee_cap_default()?.min(ceiling)
        };

        let fee = DynamicFee::new(fee_cap, tip_cap);
        debug!(?fee, gas_limit, "Estimated dynamic fee");
        Ok((fee, gas_limit))
    }

    #[instrument(skip(self), fields(domain = %self.domain))]
    async fn bump_dynamic_fee(
        &self,
        original_fee: DynamicFee,
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(DynamicFee, GasLimit)> {
        let gas_limit = self.adjusted_limit(gas_limit)?;
        let default_tip_cap = self.config.gas_tip_cap_default()?;
        let ceiling = self.ceiling(max_gas_price)?;

        let fee = self
            .bump_policy()?
            .bump_dynamic(original_fee, default_tip_cap, ceiling)
            .map_err(|err| self.bump_failed(err))?;

        Ok((fee, gas_limit))
    }
}

#[cfg(test)]
mod tests {
    use ethers_core::types::U256;
    use tracing_test::traced_test;

    use super::*;
    use crate::config::{ConfigError, GasEstimatorConf, MockGasConfig};
    use crate::error::ErrorClass;
    use crate::tests::fixed_price_conf;

    const MAX_GAS_PRICE: u64 = 1_000_000;
    const DOMAIN: &str = "test";

    fn estimator(conf: GasEstimatorConf) -> (FixedPriceEstimator, EstimatorMetrics) {
        let metrics = EstimatorMetrics::dummy_instance();
        let estimator =
            FixedPriceEstimator::new(DOMAIN.to_owned(), Arc::new(conf), metrics.clone());
        (estimator, metrics)
    }

    #[tokio::test]
    async fn legacy_gas_uses_default_price_and_multiplier() {
        let (estimator, _) = estimator(fixed_price_conf());

        let (price, limit) = estimator
            .get_legacy_gas(&[], 100_000, MAX_GAS_PRICE.into(), &[])
            .await
            .unwrap();

        assert_eq!(price, U256::from(42));
        assert_eq!(limit, 110_000);
    }

    #[tokio::test]
    async fn legacy_gas_is_deterministic() {
        let (estimator, _) = estimator(fixed_price_conf());

        let first = estimator
            .get_legacy_gas(&[1, 2, 3], 100_000, MAX_GAS_PRICE.into(), &[])
            .await
            .unwrap();
        let second = estimator
            .get_legacy_gas(
                &[1, 2, 3],
                100_000,
                MAX_GAS_PRICE.into(),
                &[EstimatorOpt::ForceRefetch],
            )
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn legacy_gas_is_clamped_to_caller_maximum() {
        let (estimator, _) = estimator(fixed_price_conf());

        let (price, _) = estimator
            .get_legacy_gas(&[], 100_000, 30.into(), &[])
            .await
            .unwrap();

        assert_eq!(price, U256::from(30));
    }

    #[tokio::test]
    #[traced_test]
    async fn legacy_gas_is_clamped_to_global_maximum() {
        let (estimator, _) = estimator(GasEstimatorConf {
            max_price: Some(20.into()),
            ..fixed_price_conf()
        });

        let (price, _) = estimator
            .get_legacy_gas(&[], 100_000, 30.into(), &[])
            .await
            .unwrap();

        assert_eq!(price, U256::from(20));
        assert!(logs_contain("Clamping default gas price"));
    }

    #[tokio::test]
    async fn bump_legacy_gas() {
        let (estimator, _) = estimator(fixed_price_conf());

        let (price, limit) = estimator
            .bump_legacy_gas(42.into(), 100_000, MAX_GAS_PRICE.into())
            .await
            .unwrap();

        assert_eq!(price, U256::from(192));
        assert_eq!(limit, 110_000);
    }

    #[tokio::test]
    async fn bump_legacy_gas_at_ceiling_is_rejected() {
        let (estimator, metrics) = estimator(fixed_price_conf());

        let err = estimator
            .bump_legacy_gas(30.into(), 100_000, 30.into())
            .await
            .unwrap_err();

        assert!(err.is_ceiling_violation());
        assert_eq!(metrics.bump_exceeds_ceiling(DOMAIN), 1);
    }

    #[tokio::test]
    async fn dynamic_fee_with_bumping_enabled_uses_defaults() {
        let (estimator, _) = estimator(fixed_price_conf());

        let (fee, limit) = estimator
            .get_dynamic_fee(100_000, MAX_GAS_PRICE.into())
            .await
            .unwrap();

        assert_eq!(fee, DynamicFee::new(100.into(), 52.into()));
        assert_eq!(limit, 110_000);
    }

    #[tokio::test]
    async fn dynamic_fee_with_bumping_disabled_uses_ceiling() {
        let (estimator, _) = estimator(GasEstimatorConf {
            bump_threshold: 0,
            ..fixed_price_conf()
        });

        let (fee, _) = estimator
            .get_dynamic_fee(100_000, MAX_GAS_PRICE.into())
            .await
            .unwrap();
        assert_eq!(fee, DynamicFee::new(MAX_GAS_PRICE.into(), 52.into()));

        let (fee, _) = estimator.get_dynamic_fee(100_000, 500.into()).await.unwrap();
        assert_eq!(fee, DynamicFee::new(500.into(), 52.into()));
    }

    #[tokio::test]
    async fn dynamic_fee_cap_is_clamped_but_tip_cap_is_not() {
        let (estimator, _) = estimator(fixed_price_conf());

        let (fee, _) = estimator.get_dynamic_fee(100_000, 10.into()).await.unwrap();

        assert_eq!(fee, DynamicFee::new(10.into(), 52.into()));
    }

    #[tokio::test]
    async fn bump_dynamic_fee() {
        let (estimator, _) = estimator(fixed_price_conf());

        let (fee, limit) = estimator
            .bump_dynamic_fee(
                DynamicFee::new(100.into(), 52.into()),
                100_000,
                MAX_GAS_PRICE.into(),
            )
            .await
            .unwrap();

        // tip: max(57, 52 + 150) = 202, fee: max(110, 100 + 150) = 250
        assert_eq!(fee, DynamicFee::new(250.into(), 202.into()));
        assert_eq!(limit, 110_000);
    }

    #[tokio::test]
    async fn bump_dynamic_fee_at_ceiling_is_rejected() {
        let (estimator, metrics) = estimator(fixed_price_conf());

        let err = estimator
            .bump_dynamic_fee(DynamicFee::new(100.into(), 52.into()), 100_000, 100.into())
            .await
            .unwrap_err();

        assert!(err.is_ceiling_violation());
        assert_eq!(metrics.bump_exceeds_ceiling(DOMAIN), 1);
    }

    #[tokio::test]
    async fn config_errors_are_propagated() {
        let mut config = MockGasConfig::new();
        config.expect_gas_limit_multiplier().returning(|| Ok(1.0));
        config
            .expect_gas_price_default()
            .returning(|| Err(ConfigError::Missing("priceDefault")));
        let estimator = FixedPriceEstimator::new(
            DOMAIN.to_owned(),
            Arc::new(config),
            EstimatorMetrics::dummy_instance(),
        );

        let err = estimator
            .get_legacy_gas(&[], 100_000, MAX_GAS_PRICE.into(), &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GasEstimatorError::Config(ConfigError::Missing("priceDefault"))
        ));
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[tokio::test]
    async fn config_is_read_on_every_call() {
        let mut config = MockGasConfig::new();
        config
            .expect_gas_limit_multiplier()
            .times(2)
            .returning(|| Ok(1.0));
        config
            .expect_gas_price_default()
            .times(2)
            .returning(|| Ok(42.into()));
        config
            .expect_max_gas_price_wei()
            .times(2)
            .returning(|| Ok(MAX_GAS_PRICE.into()));
        let estimator = FixedPriceEstimator::new(
            DOMAIN.to_owned(),
            Arc::new(config),
            EstimatorMetrics::dummy_instance(),
        );

        for _ in 0..2 {
            estimator
                .get_legacy_gas(&[], 21_000, MAX_GAS_PRICE.into(), &[])
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn new_heads_are_ignored() {
        let (estimator, _) = estimator(fixed_price_conf());

        estimator.on_new_longest_chain(&ChainHead::default()).await;

        let (price, _) = estimator
            .get_legacy_gas(&[], 100_000, MAX_GAS_PRICE.into(), &[])
            .await
            .unwrap();
        assert_eq!(price, U256::from(42));
    }
}
