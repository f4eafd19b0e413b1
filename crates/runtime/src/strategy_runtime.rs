use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use core_sim::{InstrumentId, StrategyId, Tick};
use strategy::{Signal, Strategy, StrategyError, StrategyState};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub enum ComputationFailure {
    Error(StrategyError),
    TimedOut { budget: Duration },
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    pub strategy_id: StrategyId,
    pub failure: ComputationFailure,
}

#[derive(Debug, Default)]
pub struct RoundSignals {
    pub signals: Vec<Signal>,
    pub failures: Vec<StrategyFailure>,
}

type Outcome = Result<Vec<Signal>, ComputationFailure>;

struct Registered {
    id: StrategyId,
    computation: Arc<dyn Strategy>,
    state: Arc<StrategyState>,
    running: Arc<AtomicBool>,
}

struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StrategyRuntime {
    entries: Vec<Registered>,
    index: HashMap<StrategyId, usize>,
    timeout: Duration,
    pool: Arc<Semaphore>,
}

impl StrategyRuntime {
    pub fn new(timeout: Duration, workers: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            timeout,
            pool: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn register<S>(&mut self, id: StrategyId, computation: S) -> Result<(), EngineError>
    where
        S: Strategy + 'static,
    {
        self.register_shared(id, Arc::new(computation))
    }

    pub fn register_shared(
        &mut self,
        id: StrategyId,
        computation: Arc<dyn Strategy>,
    ) -> Result<(), EngineError> {
        if self.index.contains_key(&id) {
            return Err(EngineError::DuplicateStrategy(id));
        }

        info!(strategy_id = %id, slot = self.entries.len(), "strategy registered");
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(Registered {
            state: Arc::new(StrategyState::new(id.clone())),
            id,
            computation,
            running: Arc::new(AtomicBool::new(false)),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &StrategyId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    pub fn slot(&self, id: &StrategyId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn state(&self, id: &StrategyId) -> Option<&StrategyState> {
        let slot = self.slot(id)?;
        Some(self.entries[slot].state.as_ref())
    }

    pub fn states(&self) -> impl Iterator<Item = &StrategyState> {
        self.entries.iter().map(|entry| entry.state.as_ref())
    }

    pub(crate) fn state_mut(&mut self, id: &StrategyId) -> Option<&mut StrategyState> {
        let slot = self.slot(id)?;
        Some(Arc::make_mut(&mut self.entries[slot].state))
    }

    pub fn mark_to_market(&mut self, instrument: &InstrumentId, price: f64) -> usize {
        let mut marked = 0;
        for entry in &mut self.entries {
            if !entry.state.has_position(instrument) {
                continue;
            }
            if let Some(position) = Arc::make_mut(&mut entry.state).position_mut(instrument) {
                position.mark(price);
                marked += 1;
            }
        }
        marked
    }

    pub(crate) fn push_equity_points(&mut self, round: u64, ts_micros: u64) -> f64 {
        self.entries
            .iter_mut()
            .map(|entry| {
                Arc::make_mut(&mut entry.state)
                    .push_equity_point(round, ts_micros)
                    .equity
            })
            .sum()
    }

    pub async fn on_tick(&self, tick: &Tick) -> RoundSignals {
        let outcomes = self.evaluate_all(tick).await;

        let mut round = RoundSignals::default();
        for (entry, outcome) in self.entries.iter().zip(outcomes) {
            match outcome {
                Ok(signals) => {
                    round
                        .signals
                        .extend(signals.into_iter().map(|mut signal| {
                            signal.strategy_id = entry.id.clone();
                            signal
                        }));
                }
                Err(failure) => {
                    warn!(strategy_id = %entry.id, ?failure, "strategy computation isolated");
                    round.failures.push(StrategyFailure {
                        strategy_id: entry.id.clone(),
                        failure,
                    });
                }
            }
        }
        round
    }

    // The permit is released when the budget runs out, not when the
    // abandoned call returns. A strategy whose previous call is still running
    // is not dispatched again until it finishes.
    async fn evaluate_all(&self, tick: &Tick) -> Vec<Outcome> {
        let tick = Arc::new(tick.clone());
        let budget = self.timeout;
        let mut outcomes: Vec<Option<Outcome>> = (0..self.entries.len()).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (slot, entry) in self.entries.iter().enumerate() {
            if entry.running.load(Ordering::Acquire) {
                outcomes[slot] = Some(Err(ComputationFailure::TimedOut { budget }));
                continue;
            }

            let computation = Arc::clone(&entry.computation);
            let state = Arc::clone(&entry.state);
            let running = Arc::clone(&entry.running);
            let tick = Arc::clone(&tick);
            let pool = Arc::clone(&self.pool);

            tasks.spawn(async move {
                let Ok(permit) = pool.acquire_owned().await else {
                    return (slot, Err(ComputationFailure::Panicked("worker pool closed".into())));
                };

                running.store(true, Ordering::Release);
                let guard = RunningGuard(running);
                let handle = tokio::task::spawn_blocking(move || {
                    let _guard = guard;
                    computation.evaluate(&tick, &state)
                });

                let outcome = match tokio::time::timeout(budget, handle).await {
                    Ok(Ok(Ok(signals))) => Ok(signals),
                    Ok(Ok(Err(err))) => Err(ComputationFailure::Error(err)),
                    Ok(Err(join_err)) if join_err.is_panic() => Err(ComputationFailure::Panicked(
                        panic_message(join_err.into_panic().as_ref()),
                    )),
                    Ok(Err(join_err)) => Err(ComputationFailure::Panicked(join_err.to_string())),
                    Err(_) => Err(ComputationFailure::TimedOut { budget }),
                };
                drop(permit);
                (slot, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((slot, outcome)) = joined {
                outcomes[slot] = Some(outcome);
            }
        }

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| {
                    Err(ComputationFailure::Panicked("evaluation task aborted".into()))
                })
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use core_sim::{InstrumentId, Position, Side, StrategyId, Tick};
    use strategy::{Signal, StrategyError, StrategyState};

    use super::{ComputationFailure, StrategyRuntime};
    use crate::error::EngineError;

    fn long_every_tick(tick: &Tick, state: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        Ok(vec![Signal::enter_long(state, tick)])
    }

    fn failing(_: &Tick, _: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        Err(StrategyError::Failed("no model".to_string()))
    }

    fn panicking(_: &Tick, _: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        panic!("strategy blew up")
    }

    fn sleepy(tick: &Tick, state: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        thread::sleep(Duration::from_millis(40));
        Ok(vec![Signal::enter_short(state, tick)])
    }

    fn stuck(_: &Tick, _: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        thread::sleep(Duration::from_millis(300));
        Ok(Vec::new())
    }

    fn owners(round: &super::RoundSignals) -> Vec<&str> {
        round
            .signals
            .iter()
            .map(|signal| signal.strategy_id.as_str())
            .collect()
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut runtime = StrategyRuntime::new(Duration::from_millis(10), 1);
        runtime
            .register(StrategyId::new("a"), long_every_tick)
            .unwrap();

        let err = runtime
            .register(StrategyId::new("a"), long_every_tick)
            .unwrap_err();

        assert!(matches!(err, EngineError::DuplicateStrategy(id) if id.as_str() == "a"));
        assert_eq!(runtime.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sequential_mode_keeps_registration_order_and_isolates_failures() {
        let mut runtime = StrategyRuntime::new(Duration::from_secs(5), 1);
        runtime.register(StrategyId::new("b"), long_every_tick).unwrap();
        runtime.register(StrategyId::new("broken"), failing).unwrap();
        runtime.register(StrategyId::new("boom"), panicking).unwrap();
        runtime.register(StrategyId::new("a"), long_every_tick).unwrap();

        let round = runtime.on_tick(&Tick::trade("ES", 1, 1, 100.0)).await;

        let owners: Vec<&str> = round
            .signals
            .iter()
            .map(|signal| signal.strategy_id.as_str())
            .collect();
        assert_eq!(owners, vec!["b", "a"]);
        assert_eq!(round.failures.len(), 2);
        assert_eq!(round.failures[0].strategy_id.as_str(), "broken");
        assert!(matches!(
            round.failures[0].failure,
            ComputationFailure::Error(StrategyError::Failed(_))
        ));
        assert_eq!(
            round.failures[1].failure,
            ComputationFailure::Panicked("strategy blew up".to_string())
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sequential_mode_discards_signals_that_blew_the_budget() {
        let mut runtime = StrategyRuntime::new(Duration::from_millis(5), 1);
        runtime.register(StrategyId::new("slow"), sleepy).unwrap();

        let round = runtime.on_tick(&Tick::trade("ES", 1, 1, 100.0)).await;

        assert!(round.signals.is_empty());
        assert!(matches!(
            round.failures[0].failure,
            ComputationFailure::TimedOut { .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pooled_mode_matches_sequential_ordering_and_times_out_stragglers() {
        let mut runtime = StrategyRuntime::new(Duration::from_millis(15), 4);
        runtime.register(StrategyId::new("slow"), sleepy).unwrap();
        runtime.register(StrategyId::new("b"), long_every_tick).unwrap();
        runtime.register(StrategyId::new("boom"), panicking).unwrap();
        runtime.register(StrategyId::new("a"), long_every_tick).unwrap();

        let round = runtime.on_tick(&Tick::trade("ES", 1, 1, 100.0)).await;

        let owners: Vec<&str> = round
            .signals
            .iter()
            .map(|signal| signal.strategy_id.as_str())
            .collect();
        assert_eq!(owners, vec!["b", "a"]);
        let failed: Vec<&str> = round
            .failures
            .iter()
            .map(|failure| failure.strategy_id.as_str())
            .collect();
        assert_eq!(failed, vec!["slow", "boom"]);
        assert!(matches!(
            round.failures[0].failure,
            ComputationFailure::TimedOut { .. }
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sequential_round_returns_at_the_budget_when_a_computation_hangs() {
        let mut runtime = StrategyRuntime::new(Duration::from_millis(20), 1);
        runtime.register(StrategyId::new("stuck"), stuck).unwrap();
        runtime.register(StrategyId::new("a"), long_every_tick).unwrap();

        let started = Instant::now();
        let round = runtime.on_tick(&Tick::trade("ES", 1, 1, 100.0)).await;

        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(owners(&round), vec!["a"]);
        assert_eq!(round.failures.len(), 1);
        assert!(matches!(
            round.failures[0].failure,
            ComputationFailure::TimedOut { .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn healthy_strategy_keeps_signalling_while_a_peer_stays_stuck() {
        let mut runtime = StrategyRuntime::new(Duration::from_millis(20), 2);
        runtime.register(StrategyId::new("slow"), stuck).unwrap();
        runtime.register(StrategyId::new("healthy"), long_every_tick).unwrap();

        for seq in 1..=4 {
            let round = runtime
                .on_tick(&Tick::trade("ES", seq, seq, 100.0))
                .await;

            assert_eq!(owners(&round), vec!["healthy"], "round {seq}");
            assert_eq!(round.failures.len(), 1, "round {seq}");
            assert_eq!(round.failures[0].strategy_id.as_str(), "slow");
            assert!(matches!(
                round.failures[0].failure,
                ComputationFailure::TimedOut { .. }
            ));
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn single_worker_is_not_held_by_an_abandoned_call() {
        let mut runtime = StrategyRuntime::new(Duration::from_millis(20), 1);
        runtime.register(StrategyId::new("slow"), stuck).unwrap();
        runtime.register(StrategyId::new("a"), long_every_tick).unwrap();
        runtime.register(StrategyId::new("b"), long_every_tick).unwrap();

        for seq in 1..=3 {
            let round = runtime
                .on_tick(&Tick::trade("ES", seq, seq, 100.0))
                .await;

            assert_eq!(owners(&round), vec!["a", "b"], "round {seq}");
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn signals_are_restamped_with_the_registered_owner() {
        let mut runtime = StrategyRuntime::new(Duration::from_secs(5), 1);
        let impostor = |tick: &Tick, _: &StrategyState| -> Result<Vec<Signal>, StrategyError> {
            Ok(vec![Signal::new(
                StrategyId::new("someone-else"),
                tick.instrument.clone(),
                strategy::SignalKind::EnterLong,
                tick.ts_micros,
            )])
        };
        runtime.register(StrategyId::new("owner"), impostor).unwrap();

        let round = runtime.on_tick(&Tick::trade("ES", 1, 1, 100.0)).await;

        assert_eq!(round.signals[0].strategy_id.as_str(), "owner");
    }

    #[test]
    fn mark_to_market_only_touches_the_ticked_instrument() {
        let mut runtime = StrategyRuntime::new(Duration::from_secs(5), 1);
        let id = StrategyId::new("a");
        runtime.register(id.clone(), long_every_tick).unwrap();
        for instrument in ["ES", "NQ"] {
            let position = Position::open(
                id.clone(),
                InstrumentId::new(instrument),
                Side::Long,
                100.0,
                1.0,
                0,
                1,
            );
            runtime
                .state_mut(&id)
                .unwrap()
                .insert_position(position)
                .unwrap();
        }

        let marked = runtime.mark_to_market(&InstrumentId::new("ES"), 103.0);

        let state = runtime.state(&id).unwrap();
        assert_eq!(marked, 1);
        assert_eq!(state.position(&"ES".into()).unwrap().mfe, 3.0);
        assert_eq!(state.position(&"NQ".into()).unwrap().mfe, 0.0);
    }
}
