use std::collections::VecDeque;

use core_sim::StrategyId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
    pub left: StrategyId,
    pub right: StrategyId,
    pub coefficient: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub window: usize,
    pub strategies: Vec<StrategyId>,
    pub excluded: Vec<StrategyId>,
    pub pairs: Vec<CorrelationPair>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &StrategyId, b: &StrategyId) -> Option<f64> {
        if a == b {
            return self.strategies.contains(a).then_some(1.0);
        }
        self.pairs
            .iter()
            .find(|pair| {
                (&pair.left == a && &pair.right == b) || (&pair.left == b && &pair.right == a)
            })
            .and_then(|pair| pair.coefficient)
    }
}

#[derive(Debug, Clone)]
pub struct RollingCorrelation {
    window: usize,
    increments: Vec<VecDeque<f64>>,
}

impl RollingCorrelation {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            increments: Vec::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn record(&mut self, slot: usize, increment: f64) {
        if self.increments.len() <= slot {
            self.increments.resize_with(slot + 1, VecDeque::new);
        }
        let series = &mut self.increments[slot];
        series.push_back(increment);
        while series.len() > self.window {
            series.pop_front();
        }
    }

    pub fn is_warm(&self, slot: usize) -> bool {
        self.increments
            .get(slot)
            .is_some_and(|series| series.len() >= self.window)
    }

    pub fn matrix(&self, ids: &[StrategyId]) -> CorrelationMatrix {
        let mut strategies = Vec::new();
        let mut excluded = Vec::new();
        let mut series = Vec::new();

        for (slot, id) in ids.iter().enumerate() {
            if self.is_warm(slot) {
                strategies.push(id.clone());
                series.push(self.increments[slot].iter().copied().collect::<Vec<_>>());
            } else {
                excluded.push(id.clone());
            }
        }

        let mut pairs = Vec::new();
        for i in 0..strategies.len() {
            for j in (i + 1)..strategies.len() {
                pairs.push(CorrelationPair {
                    left: strategies[i].clone(),
                    right: strategies[j].clone(),
                    coefficient: pearson(&series[i], &series[j]),
                });
            }
        }

        CorrelationMatrix {
            window: self.window,
            strategies,
            excluded,
            pairs,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mean_x = mean(x);
    let mean_y = mean(y);
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}
