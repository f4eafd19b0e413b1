use core_sim::BpsCostModel;
use runtime::{Engine, EngineError};

use crate::config::Config;
use crate::roster::{Roster, RosterError};

#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub fn build_engine(config: &Config, roster: &Roster) -> Result<Engine, WiringError> {
    let cost_model = BpsCostModel::new(config.slippage_bps, config.fee_bps)
        .map_err(EngineError::from)?
        .crossing_quotes();

    let builder = roster
        .build()?
        .into_iter()
        .fold(
            Engine::builder(config.engine).cost_model(cost_model),
            |builder, (id, computation)| builder.strategy(id, computation),
        );

    Ok(builder.build()?)
}
