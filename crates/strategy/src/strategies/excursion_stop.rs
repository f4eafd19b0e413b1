use core_sim::{PositionState, Tick};

use crate::error::StrategyError;
use crate::signal::{Signal, SignalKind};
use crate::state::StrategyState;
use crate::Strategy;

#[derive(Debug, Clone)]
pub struct ExcursionStop<S> {
    inner: S,
    max_adverse: f64,
}

impl<S: Strategy> ExcursionStop<S> {
    pub fn new(inner: S, max_adverse: f64) -> Result<Self, StrategyError> {
        if !max_adverse.is_finite() || max_adverse <= 0.0 {
            return Err(StrategyError::InvalidParameter {
                name: "max_adverse",
                value: max_adverse,
            });
        }

        Ok(Self { inner, max_adverse })
    }
}

impl<S: Strategy> Strategy for ExcursionStop<S> {
    fn evaluate(&self, tick: &Tick, state: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        let mut signals = self.inner.evaluate(tick, state)?;

        let breached = state.position(&tick.instrument).is_some_and(|position| {
            position.state == PositionState::Open && position.mae <= -self.max_adverse
        });
        let already_exiting = signals
            .iter()
            .any(|signal| signal.kind == SignalKind::Exit && signal.instrument == tick.instrument);

        if breached && !already_exiting {
            signals.retain(|signal| signal.instrument != tick.instrument);
            signals.push(Signal::exit(state, tick));
        }

        Ok(signals)
    }
}
