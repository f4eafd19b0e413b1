use std::{fs, io, path::Path};

use core_sim::{InstrumentId, Tick};
use serde::Deserialize;
use strategy::strategies::{ExcursionStop, PriceBand, Scripted};
use strategy::{Signal, SignalKind, SizingConfig, Strategy, StrategyError, StrategyState};

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to read strategy roster: {0}")]
    Io(#[from] io::Error),
    #[error("malformed strategy roster: {0}")]
    Json(#[from] serde_json::Error),
    #[error("strategy {id}: {source}")]
    Strategy {
        id: String,
        #[source]
        source: StrategyError,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Roster {
    pub strategies: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    #[serde(flatten)]
    pub definition: StrategyDef,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDef {
    PriceBand {
        instrument: String,
        reference: f64,
        threshold: f64,
        #[serde(default = "default_size")]
        size: f64,
    },
    Scripted {
        steps: Vec<ScriptStep>,
    },
    ExcursionStop {
        max_adverse: f64,
        inner: Box<StrategyDef>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptStep {
    pub instrument: String,
    pub seq: u64,
    pub signal: SignalKind,
    #[serde(default)]
    pub size: Option<f64>,
}

fn default_size() -> f64 {
    1.0
}

// ExcursionStop is generic over its inner computation, hence an enum and not a trait object.
#[derive(Debug, Clone)]
pub enum BuiltStrategy {
    PriceBand(PriceBand),
    Scripted(Scripted),
    Guarded(Box<ExcursionStop<BuiltStrategy>>),
}

impl Strategy for BuiltStrategy {
    fn evaluate(&self, tick: &Tick, state: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        match self {
            Self::PriceBand(band) => band.evaluate(tick, state),
            Self::Scripted(script) => script.evaluate(tick, state),
            Self::Guarded(guard) => guard.evaluate(tick, state),
        }
    }
}

impl StrategyDef {
    pub fn build(&self) -> Result<BuiltStrategy, StrategyError> {
        match self {
            Self::PriceBand {
                instrument,
                reference,
                threshold,
                size,
            } => PriceBand::new(
                InstrumentId::new(instrument.as_str()),
                *reference,
                *threshold,
                SizingConfig::new(*size)?,
            )
            .map(BuiltStrategy::PriceBand),
            Self::Scripted { steps } => {
                let script = steps.iter().fold(Scripted::new(), |script, step| match step.size {
                    Some(size) => script.sized_at(&step.instrument, step.seq, step.signal, size),
                    None => script.at(&step.instrument, step.seq, step.signal),
                });
                Ok(BuiltStrategy::Scripted(script))
            }
            Self::ExcursionStop { max_adverse, inner } => {
                let guard = ExcursionStop::new(inner.build()?, *max_adverse)?;
                Ok(BuiltStrategy::Guarded(Box::new(guard)))
            }
        }
    }
}

impl Roster {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, RosterError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn build(&self) -> Result<Vec<(String, BuiltStrategy)>, RosterError> {
        self.strategies
            .iter()
            .map(|entry| {
                entry
                    .definition
                    .build()
                    .map(|built| (entry.id.clone(), built))
                    .map_err(|source| RosterError::Strategy {
                        id: entry.id.clone(),
                        source,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use core_sim::{StrategyId, Tick};
    use strategy::{SignalKind, Strategy, StrategyError, StrategyState};

    use super::{BuiltStrategy, Roster, RosterError, StrategyDef};

    const ROSTER: &str = r#"{
        "strategies": [
            { "id": "band", "kind": "price_band", "instrument": "ES", "reference": 100.0, "threshold": 2.0 },
            {
                "id": "guarded",
                "kind": "excursion_stop",
                "max_adverse": 3.0,
                "inner": {
                    "kind": "scripted",
                    "steps": [
                        { "instrument": "ES", "seq": 1, "signal": "enter_long" },
                        { "instrument": "ES", "seq": 4, "signal": "exit", "size": 2.0 }
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn parses_tagged_definitions_with_nested_guards() {
        let roster = Roster::parse(ROSTER).unwrap();

        assert_eq!(roster.strategies.len(), 2);
        assert_eq!(
            roster.strategies[0].definition,
            StrategyDef::PriceBand {
                instrument: "ES".to_string(),
                reference: 100.0,
                threshold: 2.0,
                size: 1.0,
            }
        );
        match &roster.strategies[1].definition {
            StrategyDef::ExcursionStop { max_adverse, inner } => {
                assert_eq!(*max_adverse, 3.0);
                assert!(matches!(**inner, StrategyDef::Scripted { ref steps } if steps.len() == 2));
            }
            other => panic!("expected excursion stop, got {other:?}"),
        }
    }

    #[test]
    fn built_scripted_strategy_emits_on_its_ticks() {
        let built = Roster::parse(ROSTER).unwrap().build().unwrap();
        let (id, guarded) = &built[1];
        assert_eq!(id, "guarded");
        assert!(matches!(guarded, BuiltStrategy::Guarded(_)));

        let state = StrategyState::new(StrategyId::new("guarded"));
        let signals = guarded
            .evaluate(&Tick::trade("ES", 10, 1, 100.0), &state)
            .unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::EnterLong);
    }

    #[test]
    fn invalid_parameters_name_the_strategy() {
        let roster = Roster::parse(
            r#"{ "strategies": [
                { "id": "bad", "kind": "price_band", "instrument": "ES", "reference": 100.0, "threshold": -1.0 }
            ] }"#,
        )
        .unwrap();

        let err = roster.build().unwrap_err();

        match err {
            RosterError::Strategy { id, source } => {
                assert_eq!(id, "bad");
                assert_eq!(
                    source,
                    StrategyError::InvalidParameter {
                        name: "threshold",
                        value: -1.0
                    }
                );
            }
            other => panic!("expected strategy error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_a_json_error() {
        let err = Roster::parse(r#"{ "strategies": [ { "id": "x", "kind": "oracle" } ] }"#)
            .unwrap_err();

        assert!(matches!(err, RosterError::Json(_)));
    }
}
