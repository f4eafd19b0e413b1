use std::collections::BTreeMap;

use core_sim::{InstrumentId, Position, StrategyId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub round: u64,
    pub ts_micros: u64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    strategy_id: StrategyId,
    positions: BTreeMap<InstrumentId, Position>,
    realized_pnl: f64,
    equity_curve: Vec<EquityPoint>,
    closed_trades: u64,
    winning_trades: u64,
}

impl StrategyState {
    pub fn new(strategy_id: StrategyId) -> Self {
        Self {
            strategy_id,
            positions: BTreeMap::new(),
            realized_pnl: 0.0,
            equity_curve: Vec::new(),
            closed_trades: 0,
            winning_trades: 0,
        }
    }

    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    pub fn position(&self, instrument: &InstrumentId) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn has_position(&self, instrument: &InstrumentId) -> bool {
        self.positions.contains_key(instrument)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions
            .values()
            .map(|position| position.unrealized_pnl)
            .sum()
    }

    pub fn equity(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn closed_trades(&self) -> u64 {
        self.closed_trades
    }

    pub fn winning_trades(&self) -> u64 {
        self.winning_trades
    }

    pub fn insert_position(&mut self, position: Position) -> Result<(), Position> {
        if self.positions.contains_key(&position.instrument) {
            return Err(position);
        }
        self.positions.insert(position.instrument.clone(), position);
        Ok(())
    }

    pub fn position_mut(&mut self, instrument: &InstrumentId) -> Option<&mut Position> {
        self.positions.get_mut(instrument)
    }

    pub fn positions_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.positions.values_mut()
    }

    pub fn take_position(&mut self, instrument: &InstrumentId) -> Option<Position> {
        self.positions.remove(instrument)
    }

    pub fn record_realized(&mut self, realized_pnl: f64) {
        self.realized_pnl += realized_pnl;
        self.closed_trades += 1;
        if realized_pnl > 0.0 {
            self.winning_trades += 1;
        }
    }

    pub fn push_equity_point(&mut self, round: u64, ts_micros: u64) -> EquityPoint {
        let point = EquityPoint {
            round,
            ts_micros,
            equity: self.equity(),
        };
        self.equity_curve.push(point);
        point
    }
}
