mod config;
mod cost;
mod generators;
mod ids;
mod position;
mod tick;

pub use config::{ConfigError, EngineConfig, ExitScope, PnlAggregation};
pub use cost::{BpsCostModel, CostModel, FillRequest, FillSide, ZeroCost};
pub use generators::{IntervalGenerator, PriceGenerator, TickGenerator};
pub use ids::{InstrumentId, StrategyId};
pub use position::{ClosedPosition, Position, PositionState, Side};
pub use tick::{Tick, TickError};
