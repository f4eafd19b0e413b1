use std::collections::BTreeMap;

use core_sim::{EngineConfig, ExitScope, InstrumentId, PnlAggregation, PositionState, StrategyId, Tick};
use serde::Serialize;
use strategy::StrategyState;

use crate::correlation::{CorrelationMatrix, RollingCorrelation};
use crate::strategy_runtime::StrategyRuntime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub round: u64,
    pub ts_micros: u64,
    pub instrument: InstrumentId,
    pub strategy_unrealized: BTreeMap<StrategyId, f64>,
    pub unrealized_pnl: f64,
    pub mfe_peak: f64,
    pub mae_trough: f64,
    pub drawdown: f64,
    pub open_positions: usize,
    pub episode: u64,
    pub net_exposure: BTreeMap<InstrumentId, f64>,
    pub correlation: CorrelationMatrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    PortfolioMfeRetrace,
    InstrumentMfeRetrace,
    StrategySignal,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PortfolioMfeRetrace => "portfolio_mfe_retrace",
            Self::InstrumentMfeRetrace => "instrument_mfe_retrace",
            Self::StrategySignal => "strategy_signal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PositionKey {
    pub strategy_id: StrategyId,
    pub instrument: InstrumentId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitDirective {
    pub round: u64,
    pub reason: ExitReason,
    pub targets: Vec<PositionKey>,
    pub snapshot: PortfolioSnapshot,
}

#[derive(Debug, Clone, Copy)]
struct Episode {
    peak: f64,
    trough: f64,
}

#[derive(Debug, Default)]
struct InstrumentGroup {
    unrealized: f64,
    peak: f64,
    targets: Vec<PositionKey>,
}

pub struct PortfolioEvaluator {
    threshold: f64,
    aggregation: PnlAggregation,
    scope: ExitScope,
    episode: Option<Episode>,
    episodes: u64,
    correlation: RollingCorrelation,
    previous_equity: Vec<f64>,
}

impl PortfolioEvaluator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            threshold: config.mfe_exit_threshold,
            aggregation: config.aggregation,
            scope: config.exit_scope,
            episode: None,
            episodes: 0,
            correlation: RollingCorrelation::new(config.correlation_window),
            previous_equity: Vec::new(),
        }
    }

    pub fn evaluate(
        &mut self,
        round: u64,
        tick: &Tick,
        runtime: &StrategyRuntime,
    ) -> (PortfolioSnapshot, Option<ExitDirective>) {
        let ids: Vec<StrategyId> = runtime.ids().cloned().collect();
        let states: Vec<&StrategyState> = runtime.states().collect();

        self.record_increments(&states);
        let correlation = self.correlation.matrix(&ids);
        let weights = self.weights(&ids, &correlation);

        let mut strategy_unrealized = BTreeMap::new();
        let mut unrealized_pnl = 0.0;
        let mut open_positions = 0;
        let mut net_exposure: BTreeMap<InstrumentId, f64> = BTreeMap::new();

        for (slot, state) in states.iter().enumerate() {
            let unrealized = state.unrealized_pnl();
            strategy_unrealized.insert(ids[slot].clone(), unrealized);
            unrealized_pnl += weights[slot] * unrealized;
            open_positions += state.open_position_count();
            for position in state.positions() {
                *net_exposure.entry(position.instrument.clone()).or_default() +=
                    position.signed_size();
            }
        }

        let episode = self.advance_episode(open_positions, unrealized_pnl);
        let (mfe_peak, mae_trough) = episode.map_or((0.0, 0.0), |e| (e.peak, e.trough));
        let drawdown = if episode.is_some() { mfe_peak - unrealized_pnl } else { 0.0 };

        let snapshot = PortfolioSnapshot {
            round,
            ts_micros: tick.ts_micros,
            instrument: tick.instrument.clone(),
            strategy_unrealized,
            unrealized_pnl,
            mfe_peak,
            mae_trough,
            drawdown,
            open_positions,
            episode: self.episodes,
            net_exposure,
            correlation,
        };

        let directive = match self.scope {
            ExitScope::Portfolio => self.portfolio_exit(round, &states, &snapshot),
            ExitScope::Instrument => self.instrument_exit(round, &states, &weights),
        }
        .map(|(reason, targets)| ExitDirective {
            round,
            reason,
            targets,
            snapshot: snapshot.clone(),
        });

        (snapshot, directive)
    }

    // Called after any fill that can flatten the book mid-round.
    pub fn end_episode_if_flat(&mut self, runtime: &StrategyRuntime) -> bool {
        let flat = runtime.states().all(|state| state.open_position_count() == 0);
        if flat && self.episode.is_some() {
            self.episode = None;
            return true;
        }
        false
    }

    fn record_increments(&mut self, states: &[&StrategyState]) {
        if self.previous_equity.len() < states.len() {
            self.previous_equity.resize(states.len(), 0.0);
        }
        for (slot, state) in states.iter().enumerate() {
            let equity = state.equity();
            self.correlation
                .record(slot, equity - self.previous_equity[slot]);
            self.previous_equity[slot] = equity;
        }
    }

    fn weights(&self, ids: &[StrategyId], correlation: &CorrelationMatrix) -> Vec<f64> {
        match self.aggregation {
            PnlAggregation::Sum => vec![1.0; ids.len()],
            PnlAggregation::CorrelationWeighted => ids
                .iter()
                .map(|id| {
                    let overlap: f64 = ids
                        .iter()
                        .filter(|other| *other != id)
                        .filter_map(|other| correlation.get(id, other))
                        .map(|rho| rho.max(0.0))
                        .sum();
                    1.0 / (1.0 + overlap)
                })
                .collect(),
        }
    }

    fn advance_episode(&mut self, open_positions: usize, unrealized_pnl: f64) -> Option<Episode> {
        if open_positions == 0 {
            self.episode = None;
            return None;
        }

        let episode = match self.episode {
            Some(mut episode) => {
                episode.peak = episode.peak.max(unrealized_pnl);
                episode.trough = episode.trough.min(unrealized_pnl);
                episode
            }
            None => {
                self.episodes += 1;
                Episode {
                    peak: unrealized_pnl,
                    trough: unrealized_pnl,
                }
            }
        };
        self.episode = Some(episode);
        Some(episode)
    }

    fn retraced(&self, peak: f64, current: f64) -> bool {
        peak > 0.0 && peak - current >= self.threshold * peak
    }

    fn portfolio_exit(
        &self,
        round: u64,
        states: &[&StrategyState],
        snapshot: &PortfolioSnapshot,
    ) -> Option<(ExitReason, Vec<PositionKey>)> {
        if snapshot.open_positions == 0 || !self.retraced(snapshot.mfe_peak, snapshot.unrealized_pnl)
        {
            return None;
        }

        let targets: Vec<PositionKey> = states
            .iter()
            .flat_map(|state| state.positions())
            .filter(|position| eligible(position, round))
            .map(|position| PositionKey {
                strategy_id: position.strategy_id.clone(),
                instrument: position.instrument.clone(),
            })
            .collect();

        (!targets.is_empty()).then_some((ExitReason::PortfolioMfeRetrace, targets))
    }

    // Stateless: a group's peak is the sum of its positions' MFE.
    fn instrument_exit(
        &self,
        round: u64,
        states: &[&StrategyState],
        weights: &[f64],
    ) -> Option<(ExitReason, Vec<PositionKey>)> {
        let mut groups: BTreeMap<&InstrumentId, InstrumentGroup> = BTreeMap::new();

        for (slot, state) in states.iter().enumerate() {
            for position in state.positions() {
                let group = groups.entry(&position.instrument).or_default();
                group.unrealized += weights[slot] * position.unrealized_pnl;
                group.peak += weights[slot] * position.mfe;
                if eligible(position, round) {
                    group.targets.push(PositionKey {
                        strategy_id: position.strategy_id.clone(),
                        instrument: position.instrument.clone(),
                    });
                }
            }
        }

        let mut targets: Vec<PositionKey> = groups
            .into_values()
            .filter(|group| self.retraced(group.peak, group.unrealized))
            .flat_map(|group| group.targets)
            .collect();
        if targets.is_empty() {
            return None;
        }

        targets.sort_by_key(|key| {
            (
                states
                    .iter()
                    .position(|state| state.strategy_id() == &key.strategy_id),
                key.instrument.clone(),
            )
        });
        Some((ExitReason::InstrumentMfeRetrace, targets))
    }
}

fn eligible(position: &core_sim::Position, round: u64) -> bool {
    position.state == PositionState::Open && position.entry_round < round
}
