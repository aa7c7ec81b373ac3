use std::fmt;

use prometheus::{
    opts, register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry,
    IntCounterVec, IntGaugeVec, Registry,
};

use crate::types::GasPrice;

const METRICS_NAMESPACE: &str = "gas_estimator";

pub(crate) const LABEL_REFRESH_SUCCESS: &str = "success";
pub(crate) const LABEL_REFRESH_FAILURE: &str = "failure";

/// Prefix a metric name with the namespace.
fn namespaced(name: &str) -> String {
    format!("{}_{}", METRICS_NAMESPACE, name)
}

/// Metrics shared by the estimators of every domain
#[derive(Clone)]
pub struct EstimatorMetrics {
    /// Last price fetched by a suggested price estimator, in wei
    suggested_gas_price: IntGaugeVec,
    /// Suggested price refresh attempts, labelled by outcome
    price_refreshes: IntCounterVec,
    /// Bumps refused because the price already sits at the ceiling
    bump_exceeds_ceiling: IntCounterVec,
}

impl fmt::Debug for EstimatorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimatorMetrics").finish_non_exhaustive()
    }
}

impl EstimatorMetrics {
    pub fn new(registry: &Registry) -> eyre::Result<Self> {
        let suggested_gas_price = register_int_gauge_vec_with_registry!(
            opts!(
                namespaced("suggested_gas_price"),
                "The most recent gas price suggested by the node, in wei",
            ),
            &["domain",],
            registry.clone()
        )?;
        let price_refreshes = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("price_refreshes"),
                "The number of suggested gas price refresh attempts",
            ),
            &["domain", "status",],
            registry.clone()
        )?;
        let bump_exceeds_ceiling = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("bump_exceeds_ceiling"),
                "The number of gas bumps refused because the price reached the ceiling",
            ),
            &["domain",],
            registry.clone()
        )?;
        Ok(Self {
            suggested_gas_price,
            price_refreshes,
            bump_exceeds_ceiling,
        })
    }

    pub fn set_suggested_gas_price(&self, price: &GasPrice, domain: &str) {
        // prices above i64::MAX are not meaningful as a gauge
        let value = if *price > GasPrice::from(i64::MAX) {
            i64::MAX
        } else {
            price.as_u64() as i64
        };
        self.suggested_gas_price
            .with_label_values(&[domain])
            .set(value);
    }

    pub fn increment_price_refreshes(&self, status: &str, domain: &str) {
        self.price_refreshes
            .with_label_values(&[domain, status])
            .inc();
    }

    pub fn increment_bump_exceeds_ceiling(&self, domain: &str) {
        self.bump_exceeds_ceiling.with_label_values(&[domain]).inc();
    }

    #[cfg(test)]
    pub fn dummy_instance() -> Self {
        let registry = Registry::new();
        Self::new(&registry).unwrap()
    }

    #[cfg(test)]
    pub(crate) fn suggested_gas_price(&self, domain: &str) -> i64 {
        self.suggested_gas_price.with_label_values(&[domain]).get()
    }

    #[cfg(test)]
    pub(crate) fn price_refreshes(&self, status: &str, domain: &str) -> u64 {
        self.price_refreshes
            .with_label_values(&[domain, status])
            .get()
    }

    #[cfg(test)]
    pub(crate) fn bump_exceeds_ceiling(&self, domain: &str) -> u64 {
        self.bump_exceeds_ceiling.with_label_values(&[domain]).get()
    }
}
