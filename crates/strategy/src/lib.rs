pub mod error;
pub mod signal;
pub mod sizing;
pub mod state;
pub mod strategies;

use core_sim::Tick;

pub use error::StrategyError;
pub use signal::{Signal, SignalKind};
pub use sizing::{size_for_signal, SizingConfig};
pub use state::{EquityPoint, StrategyState};

// Implementations must be pure: no I/O, nothing kept across calls outside StrategyState.
pub trait Strategy: Send + Sync {
    fn evaluate(&self, tick: &Tick, state: &StrategyState) -> Result<Vec<Signal>, StrategyError>;
}

impl<F> Strategy for F
where
    F: Fn(&Tick, &StrategyState) -> Result<Vec<Signal>, StrategyError> + Send + Sync,
{
    fn evaluate(&self, tick: &Tick, state: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        self(tick, state)
    }
}
