use serde::{Deserialize, Serialize};

use crate::cost::FillSide;
use crate::ids::{InstrumentId, StrategyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn entry_fill(self) -> FillSide {
        match self {
            Self::Long => FillSide::Buy,
            Self::Short => FillSide::Sell,
        }
    }

    pub fn exit_fill(self) -> FillSide {
        match self {
            Self::Long => FillSide::Sell,
            Self::Short => FillSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Open,
    PendingExit,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub strategy_id: StrategyId,
    pub instrument: InstrumentId,
    pub side: Side,
    pub entry_price: f64,
    pub entry_ts_micros: u64,
    pub entry_round: u64,
    pub size: f64,
    pub last_price: f64,
    pub unrealized_pnl: f64,
    pub mfe: f64,
    pub mae: f64,
    pub state: PositionState,
}

impl Position {
    pub fn open(
        strategy_id: StrategyId,
        instrument: InstrumentId,
        side: Side,
        entry_price: f64,
        size: f64,
        entry_ts_micros: u64,
        entry_round: u64,
    ) -> Self {
        Self {
            strategy_id,
            instrument,
            side,
            entry_price,
            entry_ts_micros,
            entry_round,
            size,
            last_price: entry_price,
            unrealized_pnl: 0.0,
            mfe: 0.0,
            mae: 0.0,
            state: PositionState::Open,
        }
    }

    pub fn pnl_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    pub fn mark(&mut self, price: f64) {
        if self.state == PositionState::Closed {
            return;
        }

        let pnl = self.pnl_at(price);
        self.last_price = price;
        self.unrealized_pnl = pnl;
        self.mfe = self.mfe.max(pnl);
        self.mae = self.mae.min(pnl);
    }

    pub fn request_exit(&mut self) -> bool {
        if self.state != PositionState::Open {
            return false;
        }
        self.state = PositionState::PendingExit;
        true
    }

    pub fn is_active(&self) -> bool {
        self.state != PositionState::Closed
    }

    pub fn signed_size(&self) -> f64 {
        self.size * self.side.sign()
    }

    // Excursions stay as last marked at tick price; the fill price does not touch them.
    pub fn close(mut self, exit_price: f64, exit_ts_micros: u64) -> ClosedPosition {
        let realized_pnl = self.pnl_at(exit_price);
        self.state = PositionState::Closed;

        ClosedPosition {
            position: self,
            exit_price,
            exit_ts_micros,
            realized_pnl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_price: f64,
    pub exit_ts_micros: u64,
    pub realized_pnl: f64,
}

impl ClosedPosition {
    pub fn holding_micros(&self) -> u64 {
        self.exit_ts_micros
            .saturating_sub(self.position.entry_ts_micros)
    }
}

#[cfg(test)]
mod tests {
    use super::{Position, PositionState, Side};
    use crate::ids::{InstrumentId, StrategyId};

    fn long_at(price: f64, size: f64) -> Position {
        Position::open(
            StrategyId::new("a"),
            InstrumentId::new("X"),
            Side::Long,
            price,
            size,
            0,
            1,
        )
    }

    #[test]
    fn long_excursions_follow_price_path() {
        let mut position = long_at(100.0, 2.0);

        position.mark(103.0);
        position.mark(98.0);
        position.mark(101.0);

        assert_eq!(position.unrealized_pnl, 2.0);
        assert_eq!(position.mfe, 6.0);
        assert_eq!(position.mae, -4.0);
    }

    #[test]
    fn short_pnl_is_sign_flipped() {
        let mut position = Position::open(
            StrategyId::new("b"),
            InstrumentId::new("X"),
            Side::Short,
            50.0,
            1.0,
            0,
            1,
        );

        position.mark(47.5);
        assert_eq!(position.unrealized_pnl, 2.5);
        assert_eq!(position.mfe, 2.5);
        assert_eq!(position.mae, 0.0);
    }

    #[test]
    fn excursions_are_monotone_and_bracket_unrealized() {
        let mut position = long_at(100.0, 1.0);
        let path = [101.0, 99.5, 104.0, 102.0, 96.0, 97.0, 105.5, 100.0];
        let mut prev_mfe = position.mfe;
        let mut prev_mae = position.mae;

        for price in path {
            position.mark(price);
            assert!(position.mfe >= prev_mfe);
            assert!(position.mae <= prev_mae);
            assert!(position.mae <= position.unrealized_pnl);
            assert!(position.unrealized_pnl <= position.mfe);
            prev_mfe = position.mfe;
            prev_mae = position.mae;
        }
    }

    #[test]
    fn exit_request_only_moves_open_positions() {
        let mut position = long_at(100.0, 1.0);

        assert!(position.request_exit());
        assert_eq!(position.state, PositionState::PendingExit);
        assert!(!position.request_exit());
    }

    #[test]
    fn close_freezes_excursions_and_reports_realized_pnl() {
        let mut position = long_at(100.0, 1.0);
        position.mark(110.0);
        position.mark(104.0);

        let closed = position.close(104.0, 8_000);

        assert_eq!(closed.realized_pnl, 4.0);
        assert_eq!(closed.position.mfe, 10.0);
        assert_eq!(closed.position.state, PositionState::Closed);
        assert_eq!(closed.holding_micros(), 8_000);

        let mut frozen = closed.position.clone();
        frozen.mark(200.0);
        assert_eq!(frozen.mfe, 10.0);
    }
}
