use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use core_sim::{ConfigError, CostModel, EngineConfig, StrategyId, Tick};
use strategy::{Signal, Strategy};
use tracing::{error, info, warn};

use crate::error::{EngineError, TickContext};
use crate::events::RoundStage;
use crate::execution::{Applied, ExecutionSimulator, PerformanceRecord, RoundContext};
use crate::issues::{IssueKind, RunIssue};
use crate::logging::{RunLogEvent, RunLogEventKind, RunLogWriter};
use crate::metrics::{rounds_per_sec, RoundLatencyMetrics};
use crate::portfolio::{ExitDirective, PortfolioEvaluator, PortfolioSnapshot};
use crate::report::{DrawdownTracker, IssueCounts, RunReport, StrategySummary};
use crate::router::TickRouter;
use crate::sink::OutputSink;
use crate::source::TickSource;
use crate::strategy_runtime::{ComputationFailure, StrategyRuntime};

#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutput {
    pub round: u64,
    pub tick: TickContext,
    pub signals: Vec<Signal>,
    pub snapshot: PortfolioSnapshot,
    pub directive: Option<ExitDirective>,
    pub closed: Vec<PerformanceRecord>,
    pub issues: Vec<RunIssue>,
    pub latency_micros: u64,
}

pub struct EngineBuilder {
    config: EngineConfig,
    cost_model: Option<Arc<dyn CostModel>>,
    strategies: Vec<(StrategyId, Arc<dyn Strategy>)>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cost_model: None,
            strategies: Vec::new(),
        }
    }

    pub fn cost_model<M: CostModel + 'static>(self, model: M) -> Self {
        self.shared_cost_model(Arc::new(model))
    }

    pub fn shared_cost_model(mut self, model: Arc<dyn CostModel>) -> Self {
        self.cost_model = Some(model);
        self
    }

    pub fn strategy<S: Strategy + 'static>(self, id: impl Into<String>, computation: S) -> Self {
        self.shared_strategy(StrategyId::new(id), Arc::new(computation))
    }

    pub fn shared_strategy(mut self, id: StrategyId, computation: Arc<dyn Strategy>) -> Self {
        self.strategies.push((id, computation));
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        self.config.validate()?;
        let cost_model = self.cost_model.ok_or(ConfigError::MissingCostModel)?;

        let mut runtime =
            StrategyRuntime::new(self.config.per_strategy_timeout, self.config.worker_threads);
        for (id, computation) in self.strategies {
            runtime.register_shared(id, computation)?;
        }

        Ok(Engine {
            router: TickRouter::new(),
            runtime,
            evaluator: PortfolioEvaluator::new(&self.config),
            executor: ExecutionSimulator::new(cost_model, self.config.default_order_size),
            config: self.config,
            metrics: RoundLatencyMetrics::new(),
            drawdown: DrawdownTracker::new(),
            issues: Vec::new(),
            trades: Vec::new(),
            exit_directives: 0,
            cancel: CancelHandle::default(),
        })
    }
}

pub struct Engine {
    config: EngineConfig,
    router: TickRouter,
    runtime: StrategyRuntime,
    evaluator: PortfolioEvaluator,
    executor: ExecutionSimulator,
    metrics: RoundLatencyMetrics,
    drawdown: DrawdownTracker,
    issues: Vec<RunIssue>,
    trades: Vec<PerformanceRecord>,
    exit_directives: u64,
    cancel: CancelHandle,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn register<S: Strategy + 'static>(
        &mut self,
        id: StrategyId,
        computation: S,
    ) -> Result<(), EngineError> {
        self.runtime.register(id, computation)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn runtime(&self) -> &StrategyRuntime {
        &self.runtime
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn rounds(&self) -> u64 {
        self.router.admitted()
    }

    pub fn issues(&self) -> &[RunIssue] {
        &self.issues
    }

    pub async fn process_tick(
        &mut self,
        tick: Tick,
        log: &mut dyn RunLogWriter,
    ) -> Result<RoundOutput, EngineError> {
        let started = Instant::now();
        let round = self.router.admit(&tick)?;
        let context = TickContext::from(&tick);
        log.write(RunLogEvent::stage(round, RoundStage::TickAdmitted));

        self.runtime.mark_to_market(&tick.instrument, tick.price);
        log.write(RunLogEvent::stage(round, RoundStage::ExcursionsMarked));

        let collected = self.runtime.on_tick(&tick).await;
        let mut issues: Vec<RunIssue> = collected
            .failures
            .into_iter()
            .map(|failure| {
                log.write(RunLogEvent::new(round, RunLogEventKind::StrategyIsolated, None));
                let kind = match failure.failure {
                    ComputationFailure::Error(err) => IssueKind::StrategyFailed {
                        message: err.to_string(),
                    },
                    ComputationFailure::TimedOut { budget } => IssueKind::StrategyTimedOut {
                        budget_micros: u64::try_from(budget.as_micros()).unwrap_or(u64::MAX),
                    },
                    ComputationFailure::Panicked(message) => IssueKind::StrategyPanicked { message },
                };
                RunIssue::new(round, context.clone(), failure.strategy_id, kind)
            })
            .collect();
        let signals = collected.signals;
        log.write(RunLogEvent::stage(round, RoundStage::SignalsCollected));

        let ctx = RoundContext { round, tick: &tick };
        let mut applied = self
            .executor
            .apply_exit_signals(ctx, &signals, &mut self.runtime, &self.router);
        self.evaluator.end_episode_if_flat(&self.runtime);
        applied.merge(
            self.executor
                .apply_entries(ctx, &signals, &mut self.runtime, &self.router),
        );
        log.write(RunLogEvent::stage(round, RoundStage::EntriesApplied));

        let (snapshot, directive) = self.evaluator.evaluate(round, &tick, &self.runtime);
        log.write(RunLogEvent::stage(round, RoundStage::SnapshotBuilt));

        if let Some(directive) = &directive {
            info!(
                round,
                reason = directive.reason.as_str(),
                targets = directive.targets.len(),
                mfe_peak = directive.snapshot.mfe_peak,
                unrealized_pnl = directive.snapshot.unrealized_pnl,
                "exit directive issued"
            );
            log.write(RunLogEvent::new(round, RunLogEventKind::ExitDirectiveIssued, None));
            self.exit_directives += 1;
            applied.merge(
                self.executor
                    .apply_exits(ctx, directive, &mut self.runtime, &self.router),
            );
            self.evaluator.end_episode_if_flat(&self.runtime);
        }
        log.write(RunLogEvent::stage(round, RoundStage::ExitsApplied));

        let Applied {
            closed,
            issues: execution_issues,
            ..
        } = applied;
        for _ in &execution_issues {
            log.write(RunLogEvent::new(round, RunLogEventKind::SignalRejected, None));
        }
        issues.extend(execution_issues);

        let equity = self.runtime.push_equity_points(round, tick.ts_micros);
        self.drawdown.observe(equity);

        let latency_micros = self.metrics.record(started.elapsed());
        log.write(RunLogEvent::new(
            round,
            RunLogEventKind::RoundLatencyRecorded,
            Some(latency_micros),
        ));

        self.issues.extend(issues.iter().cloned());
        self.trades.extend(closed.iter().cloned());

        Ok(RoundOutput {
            round,
            tick: context,
            signals,
            snapshot,
            directive,
            closed,
            issues,
            latency_micros,
        })
    }

    pub async fn run(
        &mut self,
        source: &mut dyn TickSource,
        sink: &mut dyn OutputSink,
        log: &mut dyn RunLogWriter,
    ) -> Result<RunReport, EngineError> {
        info!(
            strategies = self.runtime.len(),
            workers = self.config.worker_threads,
            mfe_exit_threshold = self.config.mfe_exit_threshold,
            "run started"
        );
        let started = Instant::now();
        let mut cancelled = false;

        loop {
            if self.cancel.is_cancelled() {
                warn!(rounds = self.rounds(), "run cancelled");
                cancelled = true;
                break;
            }
            let Some(tick) = source.next_tick()? else {
                break;
            };
            let output = match self.process_tick(tick, log).await {
                Ok(output) => output,
                Err(err) => {
                    error!(%err, rounds = self.rounds(), "run aborted");
                    return Err(err);
                }
            };
            sink.record_round(&output)?;
        }
        sink.finish()?;

        let report = self.report(cancelled, started.elapsed());
        info!(
            rounds = report.rounds,
            exit_directives = report.exit_directives,
            realized_pnl = report.realized_pnl,
            issues = report.issues.len(),
            rounds_per_sec = report.rounds_per_sec,
            "run finished"
        );
        Ok(report)
    }

    pub fn report(&self, cancelled: bool, elapsed: std::time::Duration) -> RunReport {
        let strategies: Vec<StrategySummary> = self
            .runtime
            .states()
            .map(|state| StrategySummary::from_state(state, &self.issues))
            .collect();

        RunReport {
            rounds: self.rounds(),
            cancelled,
            last_tick: self.router.last_good().cloned(),
            exit_directives: self.exit_directives,
            realized_pnl: strategies.iter().map(|s| s.realized_pnl).sum(),
            unrealized_pnl: strategies.iter().map(|s| s.unrealized_pnl).sum(),
            open_positions: strategies.iter().map(|s| s.open_positions).sum(),
            max_drawdown: self.drawdown.max_drawdown(),
            strategies,
            issue_counts: IssueCounts::tally(&self.issues),
            issues: self.issues.clone(),
            trades: self.trades.clone(),
            latency: self.metrics.percentiles(),
            rounds_per_sec: rounds_per_sec(self.rounds(), elapsed),
        }
    }
}
