use tracing::debug;

use crate::events::RoundStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLogEventKind {
    Stage(RoundStage),
    StrategyIsolated,
    SignalRejected,
    ExitDirectiveIssued,
    RoundLatencyRecorded,
    ReplayArtifactWritten,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLogEvent {
    pub round: u64,
    pub kind: RunLogEventKind,
    pub latency_micros: Option<u64>,
}

impl RunLogEvent {
    pub fn new(round: u64, kind: RunLogEventKind, latency_micros: Option<u64>) -> Self {
        Self {
            round,
            kind,
            latency_micros,
        }
    }

    pub fn stage(round: u64, stage: RoundStage) -> Self {
        Self::new(round, RunLogEventKind::Stage(stage), None)
    }
}

pub trait RunLogWriter {
    fn write(&mut self, event: RunLogEvent);
}

#[derive(Debug, Default)]
pub struct InMemoryRunLogWriter {
    events: Vec<RunLogEvent>,
}

impl InMemoryRunLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RunLogEvent] {
        &self.events
    }

    pub fn stages_for(&self, round: u64) -> Vec<RoundStage> {
        self.events
            .iter()
            .filter(|event| event.round == round)
            .filter_map(|event| match event.kind {
                RunLogEventKind::Stage(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }
}

impl RunLogWriter for InMemoryRunLogWriter {
    fn write(&mut self, event: RunLogEvent) {
        self.events.push(event);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunLogWriter;

impl RunLogWriter for TracingRunLogWriter {
    fn write(&mut self, event: RunLogEvent) {
        match event.kind {
            RunLogEventKind::Stage(stage) => {
                debug!(round = event.round, stage = stage.as_str(), "round stage");
            }
            kind => {
                debug!(round = event.round, ?kind, latency_micros = ?event.latency_micros, "run event");
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullRunLogWriter;

impl RunLogWriter for NullRunLogWriter {
    fn write(&mut self, _event: RunLogEvent) {}
}
