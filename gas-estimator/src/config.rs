use std::fmt::Debug;
use std::time::Duration;

use auto_impl::auto_impl;
use ethers_core::types::U256;
use serde::{de, Deserialize, Deserializer};

use crate::types::GasPrice;

pub type ConfigResult<T> = Result<T, ConfigError>;

const DEFAULT_GAS_LIMIT_MULTIPLIER: f64 = 1.0;
const DEFAULT_GAS_BUMP_PERCENT: u16 = 20;
/// 5 gwei
const DEFAULT_GAS_BUMP_WEI: u64 = 5_000_000_000;
const DEFAULT_GAS_BUMP_THRESHOLD: u64 = 3;
const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(10);
const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Source of the numeric parameters the estimators read on every call.
///
/// Implementations must be safe to read concurrently.
#[auto_impl(&, Box, Arc)]
#[cfg_attr(test, mockall::automock)]
pub trait GasConfig: Send + Sync + Debug {
    /// Legacy gas price used when nothing better is known
    fn gas_price_default(&self) -> ConfigResult<GasPrice>;
    /// Default `max_priority_fee_per_gas`
    fn gas_tip_cap_default(&self) -> ConfigResult<GasPrice>;
    /// Default `max_fee_per_gas`, used while gas bumping is enabled
    fn gas_fee_cap_default(&self) -> ConfigResult<GasPrice>;
    /// Factor applied to every caller supplied gas limit
    fn gas_limit_multiplier(&self) -> ConfigResult<f64>;
    /// Minimum relative bump, in percent
    fn gas_bump_percent(&self) -> ConfigResult<u16>;
    /// Minimum absolute bump, in wei
    fn gas_bump_wei(&self) -> ConfigResult<GasPrice>;
    /// Global price ceiling
    fn max_gas_price_wei(&self) -> ConfigResult<GasPrice>;
    /// Number of blocks after which a stuck transaction is bumped. Zero
    /// disables bumping.
    fn gas_bump_threshold(&self) -> ConfigResult<u64>;
}

/// Which pricing strategy a chain uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EstimatorMode {
    #[default]
    FixedPrice,
    SuggestedPrice,
}

/// Timing of the suggested price refresh loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestedPriceSettings {
    /// Base period between two refreshes, before jitter
    #[serde(deserialize_with = "deserialize_secs")]
    pub poll_period: Duration,
    /// Upper bound on a single `eth_gasPrice` call
    #[serde(deserialize_with = "deserialize_secs")]
    pub rpc_timeout: Duration,
}

impl Default for SuggestedPriceSettings {
    fn default() -> Self {
        Self {
            poll_period: DEFAULT_POLL_PERIOD,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }
}

/// Gas estimator settings of a single chain.
///
/// Wei amounts may be given as JSON numbers, decimal strings or `0x`
/// prefixed hex strings. Prices have no default and are reported as
/// [`ConfigError::Missing`] when read while absent.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimatorConf {
    #[serde(default)]
    pub mode: EstimatorMode,
    #[serde(default, deserialize_with = "deserialize_wei")]
    pub price_default: Option<GasPrice>,
    #[serde(default, deserialize_with = "deserialize_wei")]
    pub tip_cap_default: Option<GasPrice>,
    #[serde(default, deserialize_with = "deserialize_wei")]
    pub fee_cap_default: Option<GasPrice>,
    #[serde(default, deserialize_with = "deserialize_wei")]
    pub max_price: Option<GasPrice>,
    #[serde(default = "default_limit_multiplier")]
    pub limit_multiplier: f64,
    #[serde(default = "default_bump_percent")]
    pub bump_percent: u16,
    #[serde(default = "default_bump_wei", deserialize_with = "deserialize_wei")]
    pub bump_wei: Option<GasPrice>,
    #[serde(default = "default_bump_threshold")]
    pub bump_threshold: u64,
    #[serde(default)]
    pub suggested_price: SuggestedPriceSettings,
}

impl Default for GasEstimatorConf {
    fn default() -> Self {
        Self {
            mode: EstimatorMode::default(),
            price_default: None,
            tip_cap_default: None,
            fee_cap_default: None,
            max_price: None,
            limit_multiplier: DEFAULT_GAS_LIMIT_MULTIPLIER,
            bump_percent: DEFAULT_GAS_BUMP_PERCENT,
            bump_wei: default_bump_wei(),
            bump_threshold: DEFAULT_GAS_BUMP_THRESHOLD,
            suggested_price: SuggestedPriceSettings::default(),
        }
    }
}

impl GasEstimatorConf {
    /// Checks every value the configured mode will read.
    pub fn validate(&self) -> ConfigResult<()> {
        self.gas_limit_multiplier()?;
        self.max_gas_price_wei()?;
        if self.mode == EstimatorMode::SuggestedPrice {
            if self.suggested_price.poll_period.is_zero() {
                return Err(ConfigError::Invalid {
                    name: "pollPeriod",
                    reason: "must be greater than zero".to_owned(),
                });
            }
            return Ok(());
        }
        self.gas_price_default()?;
        self.gas_tip_cap_default()?;
        self.gas_fee_cap_default()?;
        if self.bump_percent == 0 && self.gas_bump_wei()?.is_zero() {
            return Err(ConfigError::Invalid {
                name: "bumpPercent",
                reason: "bumpPercent and bumpWei cannot both be zero".to_owned(),
            });
        }
        Ok(())
    }
}

impl GasConfig for GasEstimatorConf {
    fn gas_price_default(&self) -> ConfigResult<GasPrice> {
        self.price_default.ok_or(ConfigError::Missing("priceDefault"))
    }

    fn gas_tip_cap_default(&self) -> ConfigResult<GasPrice> {
        self.tip_cap_default
            .ok_or(ConfigError::Missing("tipCapDefault"))
    }

    fn gas_fee_cap_default(&self) -> ConfigResult<GasPrice> {
        self.fee_cap_default
            .ok_or(ConfigError::Missing("feeCapDefault"))
    }

    fn gas_limit_multiplier(&self) -> ConfigResult<f64> {
        let multiplier = self.limit_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "limitMultiplier",
                reason: format!("expected a positive number, got {multiplier}"),
            });
        }
        Ok(multiplier)
    }

    fn gas_bump_percent(&self) -> ConfigResult<u16> {
        Ok(self.bump_percent)
    }

    fn gas_bump_wei(&self) -> ConfigResult<GasPrice> {
        self.bump_wei.ok_or(ConfigError::Missing("bumpWei"))
    }

    fn max_gas_price_wei(&self) -> ConfigResult<GasPrice> {
        self.max_price.ok_or(ConfigError::Missing("maxPrice"))
    }

    fn gas_bump_threshold(&self) -> ConfigResult<u64> {
        Ok(self.bump_threshold)
    }
}

fn default_limit_multiplier() -> f64 {
    DEFAULT_GAS_LIMIT_MULTIPLIER
}

fn default_bump_percent() -> u16 {
    DEFAULT_GAS_BUMP_PERCENT
}

fn default_bump_wei() -> Option<GasPrice> {
    Some(DEFAULT_GAS_BUMP_WEI.into())
}

fn default_bump_threshold() -> u64 {
    DEFAULT_GAS_BUMP_THRESHOLD
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWei {
    Number(u64),
    Text(String),
}

fn deserialize_wei<'de, D>(deserializer: D) -> Result<Option<GasPrice>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<RawWei>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let value = match raw {
        RawWei::Number(n) => U256::from(n),
        RawWei::Text(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => U256::from_str_radix(hex, 16).map_err(de::Error::custom)?,
                None => U256::from_dec_str(s).map_err(de::Error::custom)?,
            }
        }
    };
    Ok(Some(value))
}

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(|err| {
        de::Error::custom(format!(
            "expected a non-negative number of seconds, got {secs}: {err}"
        ))
    })
}
