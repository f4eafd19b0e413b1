use crate::ids::InstrumentId;
use crate::tick::Tick;

#[derive(Debug, Clone)]
pub struct PriceGenerator {
    state: u64,
    price: f64,
    max_step: f64,
}

impl PriceGenerator {
    pub fn new(seed: u64, start_price: f64, max_step: f64) -> Self {
        assert!(
            start_price.is_finite() && start_price > 0.0,
            "start_price must be finite and positive"
        );
        assert!(
            max_step.is_finite() && max_step >= 0.0,
            "max_step must be finite and non-negative"
        );

        Self {
            state: seed,
            price: start_price,
            max_step,
        }
    }

    pub fn next_price(&mut self) -> f64 {
        let unit = next_unit(&mut self.state);
        let delta = (unit * 2.0 - 1.0) * self.max_step;
        let floor = self.max_step.max(f64::EPSILON);
        self.price = (self.price + delta).max(floor);
        self.price
    }
}

#[derive(Debug, Clone)]
pub struct IntervalGenerator {
    state: u64,
    base_micros: u64,
    jitter_micros: u64,
}

impl IntervalGenerator {
    pub fn new(seed: u64, base_micros: u64, jitter_micros: u64) -> Self {
        Self {
            state: seed,
            base_micros,
            jitter_micros,
        }
    }

    pub fn next_interval_micros(&mut self) -> u64 {
        if self.jitter_micros == 0 {
            return self.base_micros;
        }

        let min = self.base_micros.saturating_sub(self.jitter_micros);
        let max = self.base_micros.saturating_add(self.jitter_micros);
        let width = max - min;

        if width == u64::MAX {
            return next_u64(&mut self.state);
        }

        let span = width + 1;
        let offset = next_u64(&mut self.state) % span;
        min + offset
    }
}

#[derive(Debug, Clone)]
pub struct TickGenerator {
    state: u64,
    instruments: Vec<(InstrumentId, PriceGenerator, u64)>,
    intervals: IntervalGenerator,
    ts_micros: u64,
}

impl TickGenerator {
    pub fn new(seed: u64, instruments: &[&str], start_price: f64, max_step: f64) -> Self {
        assert!(!instruments.is_empty(), "at least one instrument is required");

        let instruments = instruments
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let price_seed = seed.wrapping_add(index as u64 + 1);
                (
                    InstrumentId::new(*name),
                    PriceGenerator::new(price_seed, start_price, max_step),
                    0,
                )
            })
            .collect();

        Self {
            state: seed,
            instruments,
            intervals: IntervalGenerator::new(seed ^ 0x9e37_79b9, 1_000, 500),
            ts_micros: 0,
        }
    }

    pub fn next_tick(&mut self) -> Tick {
        let slot = (next_u64(&mut self.state) % self.instruments.len() as u64) as usize;
        self.ts_micros += self.intervals.next_interval_micros();

        let (instrument, prices, seq) = &mut self.instruments[slot];
        *seq += 1;

        Tick {
            instrument: instrument.clone(),
            ts_micros: self.ts_micros,
            seq: *seq,
            price: prices.next_price(),
            bid: None,
            ask: None,
        }
    }
}

impl Iterator for TickGenerator {
    type Item = Tick;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_tick())
    }
}

fn next_u64(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

fn next_unit(state: &mut u64) -> f64 {
    let value = next_u64(state);
    (value as f64) / (u64::MAX as f64)
}
