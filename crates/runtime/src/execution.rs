use std::sync::Arc;

use core_sim::{CostModel, FillRequest, FillSide, InstrumentId, Position, Side, StrategyId, Tick};
use serde::Serialize;
use strategy::{Signal, SignalKind};
use tracing::{debug, warn};

use crate::error::TickContext;
use crate::issues::{IssueKind, RunIssue};
use crate::portfolio::{ExitDirective, ExitReason, PositionKey};
use crate::router::TickRouter;
use crate::strategy_runtime::StrategyRuntime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRecord {
    pub strategy_id: StrategyId,
    pub instrument: InstrumentId,
    pub side: Side,
    pub size: f64,
    pub entry_round: u64,
    pub exit_round: u64,
    pub entry_ts_micros: u64,
    pub exit_ts_micros: u64,
    pub holding_micros: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub mfe: f64,
    pub mae: f64,
    pub realized_pnl: f64,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    pub round: u64,
    pub tick: &'a Tick,
}

impl RoundContext<'_> {
    fn issue(&self, strategy_id: &StrategyId, instrument: &InstrumentId, kind: IssueKind) -> RunIssue {
        RunIssue::new(
            self.round,
            TickContext::from(self.tick),
            strategy_id.clone(),
            kind,
        )
        .on_instrument(instrument.clone())
    }
}

#[derive(Debug, Default)]
pub struct Applied {
    pub opened: Vec<PositionKey>,
    pub closed: Vec<PerformanceRecord>,
    pub issues: Vec<RunIssue>,
}

impl Applied {
    pub fn merge(&mut self, other: Applied) {
        self.opened.extend(other.opened);
        self.closed.extend(other.closed);
        self.issues.extend(other.issues);
    }
}

pub struct ExecutionSimulator {
    cost_model: Arc<dyn CostModel>,
    default_order_size: f64,
}

impl ExecutionSimulator {
    pub fn new(cost_model: Arc<dyn CostModel>, default_order_size: f64) -> Self {
        Self {
            cost_model,
            default_order_size,
        }
    }

    pub fn apply_exit_signals(
        &self,
        ctx: RoundContext<'_>,
        signals: &[Signal],
        runtime: &mut StrategyRuntime,
        market: &TickRouter,
    ) -> Applied {
        let mut applied = Applied::default();

        for signal in signals.iter().filter(|signal| signal.kind == SignalKind::Exit) {
            let key = PositionKey {
                strategy_id: signal.strategy_id.clone(),
                instrument: signal.instrument.clone(),
            };
            match self.close(ctx, &key, ExitReason::StrategySignal, runtime, market) {
                Ok(record) => applied.closed.push(record),
                Err(kind) => {
                    warn!(strategy_id = %key.strategy_id, instrument = %key.instrument, issue = kind.label(), "exit signal rejected");
                    applied
                        .issues
                        .push(ctx.issue(&key.strategy_id, &key.instrument, kind));
                }
            }
        }

        applied
    }

    pub fn apply_entries(
        &self,
        ctx: RoundContext<'_>,
        signals: &[Signal],
        runtime: &mut StrategyRuntime,
        market: &TickRouter,
    ) -> Applied {
        let mut applied = Applied::default();

        for signal in signals {
            let Some(side) = signal.kind.entry_side() else {
                continue;
            };
            match self.open(ctx, signal, side, runtime, market) {
                Ok(key) => applied.opened.push(key),
                Err(kind) => {
                    warn!(strategy_id = %signal.strategy_id, instrument = %signal.instrument, issue = kind.label(), "entry rejected");
                    applied
                        .issues
                        .push(ctx.issue(&signal.strategy_id, &signal.instrument, kind));
                }
            }
        }

        applied
    }

    pub fn apply_exits(
        &self,
        ctx: RoundContext<'_>,
        directive: &ExitDirective,
        runtime: &mut StrategyRuntime,
        market: &TickRouter,
    ) -> Applied {
        let mut applied = Applied::default();

        for key in &directive.targets {
            match self.close(ctx, key, directive.reason, runtime, market) {
                Ok(record) => applied.closed.push(record),
                Err(kind) => {
                    warn!(strategy_id = %key.strategy_id, instrument = %key.instrument, issue = kind.label(), "directive target not closed");
                    applied
                        .issues
                        .push(ctx.issue(&key.strategy_id, &key.instrument, kind));
                }
            }
        }

        applied
    }

    fn fill_price(&self, tick: &Tick, side: FillSide, size: f64) -> Result<f64, IssueKind> {
        let price = self.cost_model.effective_price(&FillRequest {
            instrument: tick.instrument.clone(),
            side,
            price: tick.price,
            bid: tick.bid,
            ask: tick.ask,
            size,
        });
        if !price.is_finite() || price <= 0.0 {
            return Err(IssueKind::InvalidFillPrice { price });
        }
        Ok(price)
    }

    fn open(
        &self,
        ctx: RoundContext<'_>,
        signal: &Signal,
        side: Side,
        runtime: &mut StrategyRuntime,
        market: &TickRouter,
    ) -> Result<PositionKey, IssueKind> {
        let size = signal.size_hint.unwrap_or(self.default_order_size);
        if !size.is_finite() || size <= 0.0 {
            return Err(IssueKind::InvalidSize { size });
        }
        let tick = market
            .last_tick(&signal.instrument)
            .ok_or(IssueKind::UnknownPrice)?;
        let state = runtime
            .state_mut(&signal.strategy_id)
            .ok_or(IssueKind::UnknownStrategy)?;
        if state.has_position(&signal.instrument) {
            return Err(IssueKind::DuplicatePosition);
        }

        let fill_price = self.fill_price(tick, side.entry_fill(), size)?;
        let mut position = Position::open(
            signal.strategy_id.clone(),
            signal.instrument.clone(),
            side,
            fill_price,
            size,
            ctx.tick.ts_micros,
            ctx.round,
        );
        position.mark(tick.price);

        debug!(
            strategy_id = %signal.strategy_id,
            instrument = %signal.instrument,
            ?side,
            size,
            fill_price,
            round = ctx.round,
            "position opened"
        );
        state
            .insert_position(position)
            .map_err(|_| IssueKind::DuplicatePosition)?;

        Ok(PositionKey {
            strategy_id: signal.strategy_id.clone(),
            instrument: signal.instrument.clone(),
        })
    }

    fn close(
        &self,
        ctx: RoundContext<'_>,
        key: &PositionKey,
        reason: ExitReason,
        runtime: &mut StrategyRuntime,
        market: &TickRouter,
    ) -> Result<PerformanceRecord, IssueKind> {
        let tick = market
            .last_tick(&key.instrument)
            .ok_or(IssueKind::UnknownPrice)?;
        let state = runtime
            .state_mut(&key.strategy_id)
            .ok_or(IssueKind::UnknownStrategy)?;
        let position = state
            .position_mut(&key.instrument)
            .ok_or(IssueKind::NoOpenPosition)?;
        if !position.request_exit() {
            return Err(IssueKind::NoOpenPosition);
        }

        let (side, size) = (position.side, position.size);
        let fill_price = match self.fill_price(tick, side.exit_fill(), size) {
            Ok(price) => price,
            Err(kind) => {
                // Stay open and retry on a later directive.
                position.state = core_sim::PositionState::Open;
                return Err(kind);
            }
        };

        let position = state
            .take_position(&key.instrument)
            .ok_or(IssueKind::NoOpenPosition)?;
        let closed = position.close(fill_price, ctx.tick.ts_micros);
        state.record_realized(closed.realized_pnl);

        debug!(
            strategy_id = %key.strategy_id,
            instrument = %key.instrument,
            reason = reason.as_str(),
            fill_price,
            realized_pnl = closed.realized_pnl,
            "position closed"
        );

        let holding_micros = closed.holding_micros();
        let position = closed.position;
        Ok(PerformanceRecord {
            strategy_id: position.strategy_id,
            instrument: position.instrument,
            side: position.side,
            size: position.size,
            entry_round: position.entry_round,
            exit_round: ctx.round,
            entry_ts_micros: position.entry_ts_micros,
            exit_ts_micros: closed.exit_ts_micros,
            holding_micros,
            entry_price: position.entry_price,
            exit_price: closed.exit_price,
            mfe: position.mfe,
            mae: position.mae,
            realized_pnl: closed.realized_pnl,
            reason,
        })
    }
}
