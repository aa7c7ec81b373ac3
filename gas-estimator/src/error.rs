use crate::config::ConfigError;
use crate::types::GasPrice;

pub type GasEstimatorResult<T> = Result<T, GasEstimatorError>;

#[derive(Debug, thiserror::Error)]
pub enum GasEstimatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{operation} is not supported by the {estimator} estimator")]
    Unsupported {
        estimator: &'static str,
        operation: &'static str,
    },
    #[error("Estimator is not started")]
    NotStarted,
    #[error("Estimator stopped")]
    Stopped,
    #[error("Failed to estimate gas; gas price not set")]
    GasPriceNotSet,
    #[error(
        "Estimated gas price {price} is greater than the maximum gas price configured: {max_price}"
    )]
    PriceExceedsMaximum {
        price: GasPrice,
        max_price: GasPrice,
    },
    #[error(transparent)]
    Bump(#[from] BumpError),
    #[error("Estimator task failed: {0}")]
    TaskFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BumpError {
    #[error("Cannot bump gas price of {price}, it already reaches the ceiling of {ceiling}")]
    ExceedsCeiling { price: GasPrice, ceiling: GasPrice },
    #[error(
        "Bumped gas price of {bumped} does not exceed the original gas price of {original}; \
         increase either the bump percent or the bump increment"
    )]
    NotIncreasing {
        bumped: GasPrice,
        original: GasPrice,
    },
}

/// How a caller is expected to react to a [`GasEstimatorError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Configuration is missing or invalid. Not retried.
    Configuration,
    /// The estimator cannot serve this operation for its network class.
    Unsupported,
    /// No price is available yet, or the estimator is not running. Retry later.
    NotReady,
    /// The price is above the allowed maximum. Do not submit.
    CeilingViolation,
}

impl GasEstimatorError {
    pub fn unsupported(estimator: &'static str, operation: &'static str) -> Self {
        Self::Unsupported {
            estimator,
            operation,
        }
    }

    pub fn class(&self) -> ErrorClass {
        use GasEstimatorError::*;

        match self {
            Config(_) | Bump(BumpError::NotIncreasing { .. }) => ErrorClass::Configuration,
            Unsupported { .. } => ErrorClass::Unsupported,
            NotStarted | Stopped | GasPriceNotSet | TaskFailure(_) => ErrorClass::NotReady,
            PriceExceedsMaximum { .. } | Bump(BumpError::ExceedsCeiling { .. }) => {
                ErrorClass::CeilingViolation
            }
        }
    }

    pub fn is_ceiling_violation(&self) -> bool {
        self.class() == ErrorClass::CeilingViolation
    }
}
