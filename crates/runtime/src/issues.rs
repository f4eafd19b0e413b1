use core_sim::{InstrumentId, StrategyId};
use serde::Serialize;

use crate::error::TickContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    StrategyFailed { message: String },
    StrategyTimedOut { budget_micros: u64 },
    StrategyPanicked { message: String },
    DuplicatePosition,
    NoOpenPosition,
    InvalidSize { size: f64 },
    UnknownPrice,
    InvalidFillPrice { price: f64 },
    UnknownStrategy,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::StrategyFailed { .. } => "strategy_failed",
            Self::StrategyTimedOut { .. } => "strategy_timed_out",
            Self::StrategyPanicked { .. } => "strategy_panicked",
            Self::DuplicatePosition => "duplicate_position",
            Self::NoOpenPosition => "no_open_position",
            Self::InvalidSize { .. } => "invalid_size",
            Self::UnknownPrice => "unknown_price",
            Self::InvalidFillPrice { .. } => "invalid_fill_price",
            Self::UnknownStrategy => "unknown_strategy",
        }
    }

    pub fn is_computation_error(&self) -> bool {
        matches!(
            self,
            Self::StrategyFailed { .. } | Self::StrategyTimedOut { .. } | Self::StrategyPanicked { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunIssue {
    pub round: u64,
    pub tick: TickContext,
    pub strategy_id: StrategyId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<InstrumentId>,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl RunIssue {
    pub fn new(round: u64, tick: TickContext, strategy_id: StrategyId, kind: IssueKind) -> Self {
        Self {
            round,
            tick,
            strategy_id,
            instrument: None,
            kind,
        }
    }

    pub fn on_instrument(mut self, instrument: InstrumentId) -> Self {
        self.instrument = Some(instrument);
        self
    }
}
