use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("mfe_exit_threshold must be a finite fraction in (0, 1], got {0}")]
    InvalidExitThreshold(f64),
    #[error("correlation_window must be at least 2, a correlation needs two samples per series, got {0}")]
    InvalidCorrelationWindow(usize),
    #[error("per_strategy_timeout must be greater than zero")]
    InvalidStrategyTimeout,
    #[error("worker_threads must be at least 1")]
    InvalidWorkerThreads,
    #[error("default_order_size must be finite and positive, got {0}")]
    InvalidOrderSize(f64),
    #[error("slippage_bps must be finite and non-negative, got {0}")]
    InvalidSlippageBps(f64),
    #[error("fee_bps must be finite and non-negative, got {0}")]
    InvalidFeeBps(f64),
    #[error("a cost model must be supplied before the engine is built")]
    MissingCostModel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PnlAggregation {
    #[default]
    Sum,
    CorrelationWeighted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitScope {
    #[default]
    Portfolio,
    Instrument,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub mfe_exit_threshold: f64,
    pub correlation_window: usize,
    pub per_strategy_timeout: Duration,
    pub worker_threads: usize,
    pub default_order_size: f64,
    pub aggregation: PnlAggregation,
    pub exit_scope: ExitScope,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mfe_exit_threshold: 0.3,
            correlation_window: 20,
            per_strategy_timeout: Duration::from_millis(50),
            worker_threads: 1,
            default_order_size: 1.0,
            aggregation: PnlAggregation::Sum,
            exit_scope: ExitScope::Portfolio,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tau = self.mfe_exit_threshold;
        if !tau.is_finite() || tau <= 0.0 || tau > 1.0 {
            return Err(ConfigError::InvalidExitThreshold(tau));
        }
        if self.correlation_window < 2 {
            return Err(ConfigError::InvalidCorrelationWindow(
                self.correlation_window,
            ));
        }
        if self.per_strategy_timeout.is_zero() {
            return Err(ConfigError::InvalidStrategyTimeout);
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidWorkerThreads);
        }
        if !self.default_order_size.is_finite() || self.default_order_size <= 0.0 {
            return Err(ConfigError::InvalidOrderSize(self.default_order_size));
        }

        Ok(())
    }
}
