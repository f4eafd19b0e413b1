use core_sim::{InstrumentId, Side, StrategyId, Tick};
use serde::{Deserialize, Serialize};

use crate::state::StrategyState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    EnterLong,
    EnterShort,
    Exit,
}

impl SignalKind {
    pub fn entry_side(self) -> Option<Side> {
        match self {
            Self::EnterLong => Some(Side::Long),
            Self::EnterShort => Some(Side::Short),
            Self::Exit => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub strategy_id: StrategyId,
    pub instrument: InstrumentId,
    pub kind: SignalKind,
    pub ts_micros: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<f64>,
}

impl Signal {
    pub fn new(
        strategy_id: StrategyId,
        instrument: InstrumentId,
        kind: SignalKind,
        ts_micros: u64,
    ) -> Self {
        Self {
            strategy_id,
            instrument,
            kind,
            ts_micros,
            size_hint: None,
        }
    }

    pub fn on_tick(state: &StrategyState, tick: &Tick, kind: SignalKind) -> Self {
        Self::new(
            state.strategy_id().clone(),
            tick.instrument.clone(),
            kind,
            tick.ts_micros,
        )
    }

    pub fn enter_long(state: &StrategyState, tick: &Tick) -> Self {
        Self::on_tick(state, tick, SignalKind::EnterLong)
    }

    pub fn enter_short(state: &StrategyState, tick: &Tick) -> Self {
        Self::on_tick(state, tick, SignalKind::EnterShort)
    }

    pub fn exit(state: &StrategyState, tick: &Tick) -> Self {
        Self::on_tick(state, tick, SignalKind::Exit)
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size_hint = Some(size);
        self
    }

    pub fn with_instrument(mut self, instrument: InstrumentId) -> Self {
        self.instrument = instrument;
        self
    }
}

#[cfg(test)]
mod tests {
    use core_sim::{Side, StrategyId, Tick};

    use super::{Signal, SignalKind};
    use crate::state::StrategyState;

    #[test]
    fn tick_signals_carry_owner_instrument_and_time() {
        let state = StrategyState::new(StrategyId::new("band"));
        let tick = Tick::trade("ES", 1_500, 3, 4_200.25);

        let signal = Signal::enter_short(&state, &tick).with_size(2.0);

        assert_eq!(signal.strategy_id, StrategyId::new("band"));
        assert_eq!(signal.instrument.as_str(), "ES");
        assert_eq!(signal.ts_micros, 1_500);
        assert_eq!(signal.kind.entry_side(), Some(Side::Short));
        assert_eq!(signal.size_hint, Some(2.0));
    }

    #[test]
    fn exit_has_no_entry_side() {
        assert_eq!(SignalKind::Exit.entry_side(), None);
        assert_eq!(SignalKind::EnterLong.entry_side(), Some(Side::Long));
    }
}
