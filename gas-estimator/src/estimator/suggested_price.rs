use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use super::lifecycle::{EstimatorState, StartStopOnce};
use super::GasEstimator;
use crate::config::SuggestedPriceSettings;
use crate::error::{GasEstimatorError, GasEstimatorResult};
use crate::metrics::{EstimatorMetrics, LABEL_REFRESH_FAILURE, LABEL_REFRESH_SUCCESS};
use crate::rpc::{GasPriceRpc, ETH_GAS_PRICE};
use crate::types::{ChainHead, DynamicFee, EstimatorOpt, GasLimit, GasPrice};
use crate::utils::with_jitter;

const NAME: &str = "SuggestedPrice";

/// A forced refresh request, acknowledged once the refresh has completed.
type RefreshRequest = oneshot::Sender<()>;

/// Serves the node's `eth_gasPrice` suggestion, kept fresh by a background
/// task.
///
/// Meant for rollups that reject underpriced transactions outright, so a
/// suggested price above the caller's maximum is an error rather than being
/// clamped. Bumping and dynamic fees are not supported.
#[derive(Debug)]
pub struct SuggestedPriceEstimator {
    domain: String,
    client: Arc<dyn GasPriceRpc>,
    settings: SuggestedPriceSettings,
    metrics: EstimatorMetrics,
    price: Arc<RwLock<Option<GasPrice>>>,
    lifecycle: StartStopOnce,
    stop: CancellationToken,
    refresh_tx: mpsc::Sender<RefreshRequest>,
    refresh_rx: Mutex<Option<mpsc::Receiver<RefreshRequest>>>,
    /// Flips to `true` once the first refresh attempt has finished
    initialised: watch::Receiver<bool>,
    initialised_tx: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SuggestedPriceEstimator {
    pub fn new(
        domain: String,
        client: Arc<dyn GasPriceRpc>,
        settings: SuggestedPriceSettings,
        metrics: EstimatorMetrics,
    ) -> Self {
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (initialised_tx, initialised) = watch::channel(false);
        Self {
            domain,
            client,
            settings,
            metrics,
            price: Arc::new(RwLock::new(None)),
            lifecycle: StartStopOnce::default(),
            stop: CancellationToken::new(),
            refresh_tx,
            refresh_rx: Mutex::new(Some(refresh_rx)),
            initialised,
            initialised_tx: Mutex::new(Some(initialised_tx)),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> EstimatorState {
        self.lifecycle.state()
    }

    /// Asks the background task for a refresh and waits until it is done.
    async fn force_refresh(&self) -> GasEstimatorResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        tokio::select! {
            _ = self.stop.cancelled() => return Err(GasEstimatorError::Stopped),
            sent = self.refresh_tx.send(ack_tx) => {
                sent.map_err(|_| GasEstimatorError::Stopped)?
            }
        }
        tokio::select! {
            _ = self.stop.cancelled() => Err(GasEstimatorError::Stopped),
            ack = ack_rx => ack.map_err(|_| GasEstimatorError::Stopped),
        }
    }

    /// Waits until the first refresh attempt has finished. Fails if the
    /// estimator is stopped first.
    async fn wait_initialised(&self) -> GasEstimatorResult<()> {
        let mut initialised = self.initialised.clone();
        tokio::select! {
            _ = self.stop.cancelled() => return Err(GasEstimatorError::Stopped),
            done = initialised.wait_for(|done| *done) => {
                done.map(|_| ()).map_err(|_| {
                    GasEstimatorError::TaskFailure(
                        "refresh task exited before its first refresh".to_owned(),
                    )
                })?
            }
        }
        if self.stop.is_cancelled() {
            return Err(GasEstimatorError::Stopped);
        }
        Ok(())
    }

    fn refresher(&self) -> PriceRefresher {
        PriceRefresher {
            domain: self.domain.clone(),
            client: self.client.clone(),
            metrics: self.metrics.clone(),
            price: self.price.clone(),
            poll_period: self.settings.poll_period,
            rpc_timeout: self.settings.rpc_timeout,
            stop: self.stop.clone(),
        }
    }
}

#[async_trait]
impl GasEstimator for SuggestedPriceEstimator {
    fn name(&self) -> &'static str {
        NAME
    }

    /// Spawns the refresh task and returns once its first refresh attempt has
    /// finished, successfully or not. Starting a running estimator spawns
    /// nothing but still waits for that first attempt.
    async fn start(&self) -> GasEstimatorResult<()> {
        if !self.lifecycle.try_start()? {
            return self.wait_initialised().await;
        }

        {
            let mut task = self.task.lock();
            // a concurrent stop won the race, do not leave a task behind
            if self.stop.is_cancelled() {
                return Err(GasEstimatorError::Stopped);
            }
            let (Some(refresh_rx), Some(initialised_tx)) = (
                self.refresh_rx.lock().take(),
                self.initialised_tx.lock().take(),
            ) else {
                return Err(GasEstimatorError::TaskFailure(
                    "refresh channels already taken".to_owned(),
                ));
            };
            let span = info_span!("SuggestedPriceRefresher", domain = %self.domain);
            *task = Some(tokio::spawn(
                self.refresher()
                    .run(refresh_rx, initialised_tx)
                    .instrument(span),
            ));
        }

        self.wait_initialised().await?;
        info!(domain = %self.domain, "Started suggested gas price estimator");
        Ok(())
    }

    /// Signals the refresh task and waits for it to exit. Stopping is terminal
    /// and idempotent.
    async fn stop(&self) -> GasEstimatorResult<()> {
        if !self.lifecycle.try_stop() {
            return Ok(());
        }
        self.stop.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await
                .map_err(|err| GasEstimatorError::TaskFailure(err.to_string()))?;
        }
        info!(domain = %self.domain, "Stopped suggested gas price estimator");
        Ok(())
    }

    async fn on_new_longest_chain(&self, _head: &ChainHead) {}

    /// Returns the cached price and `gas_limit` unchanged.
    #[instrument(skip(self, _calldata, opts), fields(domain = %self.domain))]
    async fn get_legacy_gas(
        &self,
        _calldata: &[u8],
        gas_limit: GasLimit,
        max_gas_price: GasPrice,
        opts: &[EstimatorOpt],
    ) -> GasEstimatorResult<(GasPrice, GasLimit)> {
        self.lifecycle.ensure_running()?;
        if opts.contains(&EstimatorOpt::ForceRefetch) {
            self.force_refresh().await?;
        }

        let gas_price = (*self.price.read()).ok_or(GasEstimatorError::GasPriceNotSet)?;
        if gas_price > max_gas_price {
            return Err(GasEstimatorError::PriceExceedsMaximum {
                price: gas_price,
                max_price: max_gas_price,
            });
        }

        debug!(?gas_price, gas_limit, "Estimated legacy gas");
        Ok((gas_price, gas_limit))
    }

    async fn bump_legacy_gas(
        &self,
        _original_gas_price: GasPrice,
        _gas_limit: GasLimit,
        _max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(GasPrice, GasLimit)> {
        Err(GasEstimatorError::unsupported(NAME, "bump_legacy_gas"))
    }

    async fn get_dynamic_fee(
        &self,
        _gas_limit: GasLimit,
        _max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(DynamicFee, GasLimit)> {
        Err(GasEstimatorError::unsupported(NAME, "get_dynamic_fee"))
    }

    async fn bump_dynamic_fee(
        &self,
        _original_fee: DynamicFee,
        _gas_limit: GasLimit,
        _max_gas_price: GasPrice,
    ) -> GasEstimatorResult<(DynamicFee, GasLimit)> {
        Err(GasEstimatorError::unsupported(NAME, "bump_dynamic_fee"))
    }
}

impl Drop for SuggestedPriceEstimator {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// State owned by the background refresh task.
struct PriceRefresher {
    domain: String,
    client: Arc<dyn GasPriceRpc>,
    metrics: EstimatorMetrics,
    price: Arc<RwLock<Option<GasPrice>>>,
    poll_period: Duration,
    rpc_timeout: Duration,
    stop: CancellationToken,
}

impl PriceRefresher {
    async fn run(
        self,
        mut refresh_rx: mpsc::Receiver<RefreshRequest>,
        initialised: watch::Sender<bool>,
    ) {
        self.refresh().await;
        initialised.send_replace(true);

        loop {
            // measured from the end of the previous refresh
            let next_refresh = sleep(with_jitter(self.poll_period));
            tokio::select! {
                _ = self.stop.cancelled() => break,
                request = refresh_rx.recv() => {
                    let Some(ack) = request else { break };
                    self.refresh().await;
                    let _ = ack.send(());
                }
                _ = next_refresh => self.refresh().await,
            }
        }
        debug!("Suggested gas price refresher exited");
    }

    /// Fetches the current suggestion. Failures keep the previous price.
    async fn refresh(&self) {
        let call = timeout(
            self.rpc_timeout,
            self.client.call_scalar(ETH_GAS_PRICE, vec![]),
        );
        let result = tokio::select! {
            _ = self.stop.cancelled() => {
                debug!("Abandoned gas price refresh on stop");
                return;
            }
            result = call => result,
        };

        match result {
            Ok(Ok(gas_price)) => {
                *self.price.write() = Some(gas_price);
                self.metrics
                    .set_suggested_gas_price(&gas_price, &self.domain);
                self.metrics
                    .increment_price_refreshes(LABEL_REFRESH_SUCCESS, &self.domain);
                debug!(?gas_price, "Refreshed suggested gas price");
            }
            Ok(Err(err)) => {
                self.metrics
                    .increment_price_refreshes(LABEL_REFRESH_FAILURE, &self.domain);
                warn!(error = %err, "Failed to refresh suggested gas price");
            }
            Err(_) => {
                self.metrics
                    .increment_price_refreshes(LABEL_REFRESH_FAILURE, &self.domain);
                warn!(
                    timeout = ?self.rpc_timeout,
                    "Failed to refresh suggested gas price: request timed out"
                );
            }
        }
    }
}
