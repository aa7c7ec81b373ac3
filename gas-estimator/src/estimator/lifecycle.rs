use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{GasEstimatorError, GasEstimatorResult};

/// Lifecycle of an estimator that owns background work.
///
/// `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EstimatorState {
    NotStarted = 0,
    Running = 1,
    Stopped = 2,
}

impl EstimatorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Start-once, stop-once state machine.
///
/// `NotStarted -> Running` only succeeds from `NotStarted`. Any state may move
/// to `Stopped`, and only the first such move is reported as a transition.
#[derive(Debug)]
pub(crate) struct StartStopOnce {
    state: AtomicU8,
}

impl Default for StartStopOnce {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(EstimatorState::NotStarted as u8),
        }
    }
}

impl StartStopOnce {
    pub(crate) fn state(&self) -> EstimatorState {
        EstimatorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `Ok(true)` if this call started the estimator and `Ok(false)`
    /// if it was already running.
    pub(crate) fn try_start(&self) -> GasEstimatorResult<bool> {
        match self.state.compare_exchange(
            EstimatorState::NotStarted as u8,
            EstimatorState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(true),
            Err(current) => match EstimatorState::from_u8(current) {
                EstimatorState::Running => Ok(false),
                _ => Err(GasEstimatorError::Stopped),
            },
        }
    }

    /// Returns `true` if this call stopped the estimator.
    pub(crate) fn try_stop(&self) -> bool {
        self.state
            .swap(EstimatorState::Stopped as u8, Ordering::AcqRel)
            != EstimatorState::Stopped as u8
    }

    /// Fails unless the estimator is running.
    pub(crate) fn ensure_running(&self) -> GasEstimatorResult<()> {
        match self.state() {
            EstimatorState::Running => Ok(()),
            EstimatorState::NotStarted => Err(GasEstimatorError::NotStarted),
            EstimatorState::Stopped => Err(GasEstimatorError::Stopped),
        }
    }
}
