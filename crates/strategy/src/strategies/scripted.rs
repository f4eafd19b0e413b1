use std::collections::BTreeMap;

use core_sim::{InstrumentId, Tick};

use crate::error::StrategyError;
use crate::signal::{Signal, SignalKind};
use crate::state::StrategyState;
use crate::Strategy;

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Emit {
        kind: SignalKind,
        size: Option<f64>,
    },
    Fail(String),
}

// Keyed on (instrument, seq) rather than call count so replays are identical.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scripted {
    steps: BTreeMap<(InstrumentId, u64), Vec<Step>>,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, instrument: &str, seq: u64, kind: SignalKind) -> Self {
        self.push(instrument, seq, Step::Emit { kind, size: None });
        self
    }

    pub fn sized_at(mut self, instrument: &str, seq: u64, kind: SignalKind, size: f64) -> Self {
        self.push(
            instrument,
            seq,
            Step::Emit {
                kind,
                size: Some(size),
            },
        );
        self
    }

    pub fn fail_at(mut self, instrument: &str, seq: u64, message: &str) -> Self {
        self.push(instrument, seq, Step::Fail(message.to_string()));
        self
    }

    fn push(&mut self, instrument: &str, seq: u64, step: Step) {
        self.steps
            .entry((InstrumentId::new(instrument), seq))
            .or_default()
            .push(step);
    }
}

impl Strategy for Scripted {
    fn evaluate(&self, tick: &Tick, state: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        let Some(steps) = self.steps.get(&(tick.instrument.clone(), tick.seq)) else {
            return Ok(Vec::new());
        };

        let mut signals = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                Step::Emit { kind, size } => {
                    let signal = Signal::on_tick(state, tick, *kind);
                    signals.push(match size {
                        Some(size) => signal.with_size(*size),
                        None => signal,
                    });
                }
                Step::Fail(message) => return Err(StrategyError::Failed(message.clone())),
            }
        }

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use core_sim::{StrategyId, Tick};

    use super::Scripted;
    use crate::error::StrategyError;
    use crate::signal::SignalKind;
    use crate::state::StrategyState;
    use crate::Strategy;

    #[test]
    fn emits_only_on_scripted_ticks() {
        let script = Scripted::new()
            .at("X", 1, SignalKind::EnterLong)
            .sized_at("X", 4, SignalKind::EnterShort, 3.0);
        let state = StrategyState::new(StrategyId::new("a"));

        let first = script.evaluate(&Tick::trade("X", 10, 1, 100.0), &state).unwrap();
        let quiet = script.evaluate(&Tick::trade("X", 20, 2, 100.0), &state).unwrap();
        let other = script.evaluate(&Tick::trade("Y", 30, 1, 100.0), &state).unwrap();
        let sized = script.evaluate(&Tick::trade("X", 40, 4, 100.0), &state).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, SignalKind::EnterLong);
        assert!(quiet.is_empty());
        assert!(other.is_empty());
        assert_eq!(sized[0].size_hint, Some(3.0));
    }

    #[test]
    fn scripted_failure_surfaces_as_strategy_error() {
        let script = Scripted::new().fail_at("X", 50, "boom");
        let state = StrategyState::new(StrategyId::new("a"));

        let err = script
            .evaluate(&Tick::trade("X", 50, 50, 100.0), &state)
            .unwrap_err();

        assert_eq!(err, StrategyError::Failed("boom".to_string()));
    }
}
