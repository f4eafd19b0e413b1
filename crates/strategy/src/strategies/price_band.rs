use core_sim::{InstrumentId, Side, Tick};

use crate::error::StrategyError;
use crate::signal::{Signal, SignalKind};
use crate::sizing::{size_for_signal, SizingConfig};
use crate::state::StrategyState;
use crate::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Above,
    Below,
    Inside,
}

pub fn divergence(price: f64, reference: f64) -> f64 {
    price - reference
}

pub fn band_for(price: f64, reference: f64, threshold: f64) -> Band {
    let divergence = divergence(price, reference);
    let threshold = threshold.abs();

    if divergence > threshold {
        Band::Above
    } else if divergence < -threshold {
        Band::Below
    } else {
        Band::Inside
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBand {
    instrument: InstrumentId,
    reference: f64,
    threshold: f64,
    sizing: SizingConfig,
}

impl PriceBand {
    pub fn new(
        instrument: InstrumentId,
        reference: f64,
        threshold: f64,
        sizing: SizingConfig,
    ) -> Result<Self, StrategyError> {
        if !reference.is_finite() || reference <= 0.0 {
            return Err(StrategyError::InvalidParameter {
                name: "reference",
                value: reference,
            });
        }
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(StrategyError::InvalidParameter {
                name: "threshold",
                value: threshold,
            });
        }

        Ok(Self {
            instrument,
            reference,
            threshold,
            sizing,
        })
    }

    fn entry(&self, state: &StrategyState, tick: &Tick, kind: SignalKind) -> Signal {
        let signal = Signal::on_tick(state, tick, kind);
        match size_for_signal(kind, self.sizing) {
            Some(size) => signal.with_size(size),
            None => signal,
        }
    }
}

impl Strategy for PriceBand {
    fn evaluate(&self, tick: &Tick, state: &StrategyState) -> Result<Vec<Signal>, StrategyError> {
        if tick.instrument != self.instrument {
            return Ok(Vec::new());
        }

        let Some(position) = state.position(&self.instrument) else {
            let signal = match band_for(tick.price, self.reference, self.threshold) {
                Band::Above => Some(self.entry(state, tick, SignalKind::EnterLong)),
                Band::Below => Some(self.entry(state, tick, SignalKind::EnterShort)),
                Band::Inside => None,
            };
            return Ok(signal.into_iter().collect());
        };

        let divergence = divergence(tick.price, self.reference);
        let crossed_back = match position.side {
            Side::Long => divergence <= 0.0,
            Side::Short => divergence >= 0.0,
        };

        if crossed_back {
            Ok(vec![Signal::exit(state, tick)])
        } else {
            Ok(Vec::new())
        }
    }
}
