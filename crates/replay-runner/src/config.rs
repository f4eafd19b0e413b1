use std::{env, time::Duration};

use core_sim::{EngineConfig, ExitScope, PnlAggregation};

const DEFAULT_TICKS_PATH: &str = "data/ticks.csv";
const DEFAULT_STRATEGIES_PATH: &str = "data/strategies.json";
const DEFAULT_OUTPUT_DIR: &str = "artifacts";
const DEFAULT_SLIPPAGE_BPS: f64 = 0.0;
const DEFAULT_FEE_BPS: f64 = 0.0;

const TICKS_PATH_KEY: &str = "PORTFOLIO_TICKS_PATH";
const STRATEGIES_PATH_KEY: &str = "PORTFOLIO_STRATEGIES_PATH";
const OUTPUT_DIR_KEY: &str = "PORTFOLIO_OUTPUT_DIR";
const EXIT_THRESHOLD_KEY: &str = "PORTFOLIO_MFE_EXIT_THRESHOLD";
const CORRELATION_WINDOW_KEY: &str = "PORTFOLIO_CORRELATION_WINDOW";
const STRATEGY_TIMEOUT_KEY: &str = "PORTFOLIO_STRATEGY_TIMEOUT_MS";
const WORKERS_KEY: &str = "PORTFOLIO_WORKERS";
const SLIPPAGE_BPS_KEY: &str = "PORTFOLIO_SLIPPAGE_BPS";
const FEE_BPS_KEY: &str = "PORTFOLIO_FEE_BPS";
const EXIT_SCOPE_KEY: &str = "PORTFOLIO_EXIT_SCOPE";
const AGGREGATION_KEY: &str = "PORTFOLIO_AGGREGATION";

#[derive(Debug, Clone)]
pub struct Config {
    pub ticks_path: String,
    pub strategies_path: String,
    pub output_dir: String,
    pub engine: EngineConfig,
    pub slippage_bps: f64,
    pub fee_bps: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must not be empty or whitespace")]
    EmptyPath(&'static str),
    #[error("{EXIT_THRESHOLD_KEY} must be a number")]
    InvalidExitThreshold,
    #[error("{CORRELATION_WINDOW_KEY} must be a positive integer")]
    InvalidCorrelationWindow,
    #[error("{STRATEGY_TIMEOUT_KEY} must be a positive integer of milliseconds")]
    InvalidStrategyTimeout,
    #[error("{WORKERS_KEY} must be a positive integer")]
    InvalidWorkers,
    #[error("{SLIPPAGE_BPS_KEY} must be a number")]
    InvalidSlippageBps,
    #[error("{FEE_BPS_KEY} must be a number")]
    InvalidFeeBps,
    #[error("{EXIT_SCOPE_KEY} must be one of: portfolio, instrument")]
    InvalidExitScope,
    #[error("{AGGREGATION_KEY} must be one of: sum, correlation_weighted")]
    InvalidAggregation,
    #[error("{0} contains non-unicode data")]
    NonUnicode(&'static str),
    #[error(transparent)]
    Engine(#[from] core_sim::ConfigError),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let ticks_path = path_env(TICKS_PATH_KEY, DEFAULT_TICKS_PATH)?;
        let strategies_path = path_env(STRATEGIES_PATH_KEY, DEFAULT_STRATEGIES_PATH)?;
        let output_dir = path_env(OUTPUT_DIR_KEY, DEFAULT_OUTPUT_DIR)?;

        let defaults = EngineConfig::default();
        let timeout_ms = parse_env(
            STRATEGY_TIMEOUT_KEY,
            u64::try_from(defaults.per_strategy_timeout.as_millis()).unwrap_or(u64::MAX),
            |value| value.parse().ok(),
            ConfigError::InvalidStrategyTimeout,
        )?;

        let engine = EngineConfig {
            mfe_exit_threshold: parse_env(
                EXIT_THRESHOLD_KEY,
                defaults.mfe_exit_threshold,
                |value| value.parse().ok(),
                ConfigError::InvalidExitThreshold,
            )?,
            correlation_window: parse_env(
                CORRELATION_WINDOW_KEY,
                defaults.correlation_window,
                |value| value.parse().ok(),
                ConfigError::InvalidCorrelationWindow,
            )?,
            per_strategy_timeout: Duration::from_millis(timeout_ms),
            worker_threads: parse_env(
                WORKERS_KEY,
                defaults.worker_threads,
                |value| value.parse().ok(),
                ConfigError::InvalidWorkers,
            )?,
            exit_scope: parse_env(
                EXIT_SCOPE_KEY,
                defaults.exit_scope,
                parse_exit_scope,
                ConfigError::InvalidExitScope,
            )?,
            aggregation: parse_env(
                AGGREGATION_KEY,
                defaults.aggregation,
                parse_aggregation,
                ConfigError::InvalidAggregation,
            )?,
            ..defaults
        };
        engine.validate()?;

        let slippage_bps = parse_env(
            SLIPPAGE_BPS_KEY,
            DEFAULT_SLIPPAGE_BPS,
            |value| value.parse().ok(),
            ConfigError::InvalidSlippageBps,
        )?;
        let fee_bps = parse_env(
            FEE_BPS_KEY,
            DEFAULT_FEE_BPS,
            |value| value.parse().ok(),
            ConfigError::InvalidFeeBps,
        )?;

        Ok(Self {
            ticks_path,
            strategies_path,
            output_dir,
            engine,
            slippage_bps,
            fee_bps,
        })
    }
}

fn read_env(key: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicode(key)),
    }
}

fn path_env(key: &'static str, default_value: &str) -> Result<String, ConfigError> {
    match read_env(key)? {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyPath(key)),
        Some(value) => Ok(value),
        None => Ok(default_value.to_owned()),
    }
}

fn parse_env<T>(
    key: &'static str,
    default_value: T,
    parse: impl Fn(&str) -> Option<T>,
    invalid_error: ConfigError,
) -> Result<T, ConfigError> {
    match read_env(key)? {
        Some(value) => parse(value.trim()).ok_or(invalid_error),
        None => Ok(default_value),
    }
}

fn parse_exit_scope(value: &str) -> Option<ExitScope> {
    match value {
        "portfolio" => Some(ExitScope::Portfolio),
        "instrument" => Some(ExitScope::Instrument),
        _ => None,
    }
}

fn parse_aggregation(value: &str) -> Option<PnlAggregation> {
    match value {
        "sum" => Some(PnlAggregation::Sum),
        "correlation_weighted" => Some(PnlAggregation::CorrelationWeighted),
        _ => None,
    }
}
