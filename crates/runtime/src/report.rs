use core_sim::StrategyId;
use serde::Serialize;
use strategy::StrategyState;

use crate::error::TickContext;
use crate::execution::PerformanceRecord;
use crate::issues::{IssueKind, RunIssue};
use crate::metrics::LatencyPercentiles;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySummary {
    pub strategy_id: StrategyId,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub closed_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub open_positions: usize,
    pub computation_errors: usize,
    pub duplicate_positions: usize,
}

impl StrategySummary {
    pub fn from_state(state: &StrategyState, issues: &[RunIssue]) -> Self {
        let own = issues
            .iter()
            .filter(|issue| &issue.strategy_id == state.strategy_id());
        let (mut computation_errors, mut duplicate_positions) = (0, 0);
        for issue in own {
            if issue.kind.is_computation_error() {
                computation_errors += 1;
            } else if issue.kind == IssueKind::DuplicatePosition {
                duplicate_positions += 1;
            }
        }

        Self {
            strategy_id: state.strategy_id().clone(),
            realized_pnl: state.realized_pnl(),
            unrealized_pnl: state.unrealized_pnl(),
            closed_trades: state.closed_trades(),
            winning_trades: state.winning_trades(),
            losing_trades: state.closed_trades() - state.winning_trades(),
            open_positions: state.open_position_count(),
            computation_errors,
            duplicate_positions,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub computation_errors: usize,
    pub duplicate_positions: usize,
    pub other: usize,
}

impl IssueCounts {
    pub fn tally(issues: &[RunIssue]) -> Self {
        issues.iter().fold(Self::default(), |mut counts, issue| {
            if issue.kind.is_computation_error() {
                counts.computation_errors += 1;
            } else if issue.kind == IssueKind::DuplicatePosition {
                counts.duplicate_positions += 1;
            } else {
                counts.other += 1;
            }
            counts
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub rounds: u64,
    pub cancelled: bool,
    pub last_tick: Option<TickContext>,
    pub exit_directives: u64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub open_positions: usize,
    pub max_drawdown: f64,
    pub strategies: Vec<StrategySummary>,
    pub issue_counts: IssueCounts,
    pub issues: Vec<RunIssue>,
    pub trades: Vec<PerformanceRecord>,
    pub latency: Option<LatencyPercentiles>,
    pub rounds_per_sec: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DrawdownTracker {
    peak: Option<f64>,
    max_drawdown: f64,
}

impl DrawdownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, equity: f64) {
        let peak = self.peak.map_or(equity, |peak| peak.max(equity));
        self.peak = Some(peak);
        self.max_drawdown = self.max_drawdown.max(peak - equity);
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }
}

#[cfg(test)]
mod tests {
    use core_sim::{StrategyId, Tick};

    use super::{DrawdownTracker, IssueCounts};
    use crate::error::TickContext;
    use crate::issues::{IssueKind, RunIssue};

    #[test]
    fn drawdown_is_largest_fall_from_a_running_peak() {
        let mut tracker = DrawdownTracker::new();
        for equity in [0.0, 5.0, 2.0, 8.0, 1.0, 9.0] {
            tracker.observe(equity);
        }

        assert_eq!(tracker.max_drawdown(), 7.0);
    }

    #[test]
    fn issue_counts_split_computation_duplicate_and_other() {
        let issue = |kind| {
            RunIssue::new(
                1,
                TickContext::from(&Tick::trade("ES", 1, 1, 100.0)),
                StrategyId::new("a"),
                kind,
            )
        };
        let issues = vec![
            issue(IssueKind::StrategyPanicked { message: "x".into() }),
            issue(IssueKind::DuplicatePosition),
            issue(IssueKind::DuplicatePosition),
            issue(IssueKind::UnknownPrice),
        ];

        let counts = IssueCounts::tally(&issues);

        assert_eq!(counts.computation_errors, 1);
        assert_eq!(counts.duplicate_positions, 2);
        assert_eq!(counts.other, 1);
    }
}
