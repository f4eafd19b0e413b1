use crate::error::StrategyError;
use crate::signal::SignalKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingConfig {
    base_order_size: f64,
}

impl SizingConfig {
    pub fn new(base_order_size: f64) -> Result<Self, StrategyError> {
        if !base_order_size.is_finite() || base_order_size <= 0.0 {
            return Err(StrategyError::InvalidParameter {
                name: "base_order_size",
                value: base_order_size,
            });
        }

        Ok(Self { base_order_size })
    }

    pub fn base_order_size(&self) -> f64 {
        self.base_order_size
    }
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_order_size: 1.0,
        }
    }
}

pub fn size_for_signal(kind: SignalKind, config: SizingConfig) -> Option<f64> {
    match kind {
        SignalKind::EnterLong | SignalKind::EnterShort => Some(config.base_order_size),
        SignalKind::Exit => None,
    }
}
