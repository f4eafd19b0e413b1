use std::fmt;

use core_sim::{ConfigError, InstrumentId, StrategyId, Tick, TickError};
use serde::Serialize;

use crate::source::SourceError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickContext {
    pub instrument: InstrumentId,
    pub seq: u64,
    pub ts_micros: u64,
    pub price: f64,
}

impl From<&Tick> for TickContext {
    fn from(tick: &Tick) -> Self {
        Self {
            instrument: tick.instrument.clone(),
            seq: tick.seq,
            ts_micros: tick.ts_micros,
            price: tick.price,
        }
    }
}

impl fmt::Display for TickContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} at {}us (px {})",
            self.instrument, self.seq, self.ts_micros, self.price
        )
    }
}

fn describe(last_good: &Option<TickContext>) -> String {
    match last_good {
        Some(context) => context.to_string(),
        None => "none".to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(
        "out-of-order tick {offending}: sequence must exceed {last_seq}; last good tick: {}",
        describe(.last_good)
    )]
    OutOfOrderTick {
        offending: TickContext,
        last_seq: u64,
        last_good: Option<TickContext>,
    },
    #[error("timestamp regression at tick {offending}; last good tick: {last_good}")]
    TimestampRegression {
        offending: TickContext,
        last_good: TickContext,
    },
    #[error("invalid tick {offending}: {source}; last good tick: {}", describe(.last_good))]
    InvalidTick {
        offending: TickContext,
        source: TickError,
        last_good: Option<TickContext>,
    },
    #[error("strategy {0} is already registered")]
    DuplicateStrategy(StrategyId),
    #[error("invalid engine configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("tick source failed: {0}")]
    Source(#[from] SourceError),
    #[error("failed to write run output: {0}")]
    Output(#[from] std::io::Error),
}
