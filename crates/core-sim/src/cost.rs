use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::ids::InstrumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillRequest {
    pub instrument: InstrumentId,
    pub side: FillSide,
    pub price: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub size: f64,
}

pub trait CostModel: Send + Sync {
    fn effective_price(&self, request: &FillRequest) -> f64;
}

impl<F> CostModel for F
where
    F: Fn(&FillRequest) -> f64 + Send + Sync,
{
    fn effective_price(&self, request: &FillRequest) -> f64 {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZeroCost;

impl CostModel for ZeroCost {
    fn effective_price(&self, request: &FillRequest) -> f64 {
        request.price
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpsCostModel {
    slippage_bps: f64,
    fee_bps: f64,
    cross_quotes: bool,
}

impl BpsCostModel {
    pub fn new(slippage_bps: f64, fee_bps: f64) -> Result<Self, ConfigError> {
        if !slippage_bps.is_finite() || slippage_bps < 0.0 {
            return Err(ConfigError::InvalidSlippageBps(slippage_bps));
        }
        if !fee_bps.is_finite() || fee_bps < 0.0 {
            return Err(ConfigError::InvalidFeeBps(fee_bps));
        }

        Ok(Self {
            slippage_bps,
            fee_bps,
            cross_quotes: false,
        })
    }

    pub fn crossing_quotes(mut self) -> Self {
        self.cross_quotes = true;
        self
    }

    fn reference_price(&self, request: &FillRequest) -> f64 {
        if !self.cross_quotes {
            return request.price;
        }
        match request.side {
            FillSide::Buy => request.ask.unwrap_or(request.price),
            FillSide::Sell => request.bid.unwrap_or(request.price),
        }
    }
}

impl CostModel for BpsCostModel {
    fn effective_price(&self, request: &FillRequest) -> f64 {
        let reference = self.reference_price(request);
        let rate = bps_to_rate(self.slippage_bps + self.fee_bps);

        match request.side {
            FillSide::Buy => reference * (1.0 + rate),
            FillSide::Sell => (reference * (1.0 - rate)).max(0.0),
        }
    }
}

fn bps_to_rate(bps: f64) -> f64 {
    bps / 10_000.0
}
