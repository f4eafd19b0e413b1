use serde::{Deserialize, Serialize};

use crate::ids::InstrumentId;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TickError {
    #[error("tick instrument must not be empty")]
    EmptyInstrument,
    #[error("tick price must be finite and positive, got {0}")]
    InvalidPrice(f64),
    #[error("tick quote must be finite, positive and not crossed (bid {bid}, ask {ask})")]
    InvalidQuote { bid: f64, ask: f64 },
}

// Ordering of seq and ts_micros is enforced by the router, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: InstrumentId,
    pub ts_micros: u64,
    pub seq: u64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
}

impl Tick {
    pub fn trade(instrument: impl Into<String>, ts_micros: u64, seq: u64, price: f64) -> Self {
        Self {
            instrument: InstrumentId::new(instrument),
            ts_micros,
            seq,
            price,
            bid: None,
            ask: None,
        }
    }

    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    pub fn validate(&self) -> Result<(), TickError> {
        if self.instrument.is_empty() {
            return Err(TickError::EmptyInstrument);
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(TickError::InvalidPrice(self.price));
        }

        let quote_side_valid = |px: f64| px.is_finite() && px > 0.0;
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => {
                if !quote_side_valid(bid) || !quote_side_valid(ask) || bid > ask {
                    return Err(TickError::InvalidQuote { bid, ask });
                }
            }
            (Some(bid), None) if !quote_side_valid(bid) => {
                return Err(TickError::InvalidQuote { bid, ask: f64::NAN });
            }
            (None, Some(ask)) if !quote_side_valid(ask) => {
                return Err(TickError::InvalidQuote { bid: f64::NAN, ask });
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Tick, TickError};

    #[test]
    fn accepts_trade_tick_with_and_without_quote() {
        assert!(Tick::trade("ES", 1, 1, 100.0).validate().is_ok());
        assert!(Tick::trade("ES", 1, 1, 100.0)
            .with_quote(99.75, 100.25)
            .validate()
            .is_ok());
    }

    #[test]
    fn rejects_non_positive_and_non_finite_prices() {
        for price in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = Tick::trade("ES", 1, 1, price).validate().unwrap_err();
            assert!(matches!(err, TickError::InvalidPrice(_)));
        }
    }

    #[test]
    fn rejects_crossed_quote() {
        let err = Tick::trade("ES", 1, 1, 100.0)
            .with_quote(100.5, 100.0)
            .validate()
            .unwrap_err();

        assert_eq!(
            err,
            TickError::InvalidQuote {
                bid: 100.5,
                ask: 100.0
            }
        );
    }

    #[test]
    fn rejects_blank_instrument() {
        let err = Tick::trade("  ", 1, 1, 100.0).validate().unwrap_err();
        assert_eq!(err, TickError::EmptyInstrument);
    }

    #[test]
    fn quote_fields_are_omitted_from_json_when_absent() {
        let json = serde_json::to_value(Tick::trade("ES", 5, 2, 101.5)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "instrument": "ES",
                "ts_micros": 5,
                "seq": 2,
                "price": 101.5,
            })
        );
    }
}
