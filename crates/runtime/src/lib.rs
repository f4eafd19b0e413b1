pub mod correlation;
pub mod engine;
pub mod error;
pub mod events;
pub mod execution;
pub mod issues;
pub mod logging;
pub mod metrics;
pub mod portfolio;
pub mod replay;
pub mod report;
pub mod router;
pub mod sink;
pub mod source;
pub mod strategy_runtime;

pub use engine::{CancelHandle, Engine, EngineBuilder, RoundOutput};
pub use error::{EngineError, TickContext};
pub use execution::PerformanceRecord;
pub use issues::{IssueKind, RunIssue};
pub use portfolio::{ExitDirective, ExitReason, PortfolioSnapshot, PositionKey};
pub use report::{RunReport, StrategySummary};
pub use sink::{OutputSink, RecordingSink};
pub use source::{CsvTickSource, SourceError, TickSource, VecTickSource};

pub const TARGET_ROUNDS_PER_SEC: u64 = 50_000;
