use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyPercentiles {
    pub count: usize,
    pub mean_micros: u64,
    pub p50_micros: u64,
    pub p90_micros: u64,
    pub p99_micros: u64,
    pub max_micros: u64,
}

#[derive(Debug, Default, Clone)]
pub struct RoundLatencyMetrics {
    samples_micros: Vec<u64>,
    total: Duration,
}

impl RoundLatencyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, latency: Duration) -> u64 {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.samples_micros.push(micros);
        self.total = self.total.saturating_add(latency);
        micros
    }

    pub fn rounds(&self) -> usize {
        self.samples_micros.len()
    }

    pub fn rounds_per_sec(&self) -> u64 {
        rounds_per_sec(self.samples_micros.len() as u64, self.total)
    }

    pub fn percentiles(&self) -> Option<LatencyPercentiles> {
        if self.samples_micros.is_empty() {
            return None;
        }

        let mut sorted = self.samples_micros.clone();
        sorted.sort_unstable();
        let count = sorted.len();
        let mean_micros = u64::try_from(self.total.as_micros() / count as u128).unwrap_or(u64::MAX);

        Some(LatencyPercentiles {
            count,
            mean_micros,
            p50_micros: nearest_rank(&sorted, 50),
            p90_micros: nearest_rank(&sorted, 90),
            p99_micros: nearest_rank(&sorted, 99),
            max_micros: sorted[count - 1],
        })
    }
}

pub fn rounds_per_sec(rounds: u64, elapsed: Duration) -> u64 {
    let nanos = elapsed.as_nanos();
    if nanos == 0 {
        return 0;
    }
    u64::try_from((rounds as u128).saturating_mul(1_000_000_000) / nanos).unwrap_or(u64::MAX)
}

fn nearest_rank(sorted: &[u64], percentile: usize) -> u64 {
    let rank = (percentile * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1)]
}
