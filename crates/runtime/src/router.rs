use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use core_sim::{InstrumentId, Tick};

use crate::error::{EngineError, TickContext};

#[derive(Debug, Default)]
pub struct TickRouter {
    last_by_instrument: HashMap<InstrumentId, Tick>,
    last_good: Option<TickContext>,
    admitted: u64,
}

impl TickRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, tick: &Tick) -> Result<u64, EngineError> {
        if let Err(source) = tick.validate() {
            return Err(EngineError::InvalidTick {
                offending: TickContext::from(tick),
                source,
                last_good: self.last_good.clone(),
            });
        }

        if let Some(previous) = self.last_by_instrument.get(&tick.instrument) {
            if tick.seq <= previous.seq {
                return Err(EngineError::OutOfOrderTick {
                    offending: TickContext::from(tick),
                    last_seq: previous.seq,
                    last_good: self.last_good.clone(),
                });
            }
        }

        if let Some(last_good) = &self.last_good {
            if tick.ts_micros < last_good.ts_micros {
                return Err(EngineError::TimestampRegression {
                    offending: TickContext::from(tick),
                    last_good: last_good.clone(),
                });
            }
        }

        self.last_by_instrument
            .insert(tick.instrument.clone(), tick.clone());
        self.last_good = Some(TickContext::from(tick));
        self.admitted += 1;
        Ok(self.admitted)
    }

    pub fn last_tick(&self, instrument: &InstrumentId) -> Option<&Tick> {
        self.last_by_instrument.get(instrument)
    }

    pub fn last_good(&self) -> Option<&TickContext> {
        self.last_good.as_ref()
    }

    pub fn admitted(&self) -> u64 {
        self.admitted
    }
}

// Equal timestamps keep arrival order: earlier stream first, then position within it.
pub fn merge_streams(streams: Vec<Vec<Tick>>) -> Vec<Tick> {
    let total = streams.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);
    let mut cursors: Vec<std::vec::IntoIter<Tick>> =
        streams.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<Tick>> = cursors.iter_mut().map(Iterator::next).collect();
    let mut heap = BinaryHeap::new();

    for (stream, head) in heads.iter().enumerate() {
        if let Some(tick) = head {
            heap.push(Reverse((tick.ts_micros, stream)));
        }
    }

    while let Some(Reverse((_, stream))) = heap.pop() {
        let Some(tick) = heads[stream].take() else {
            continue;
        };
        merged.push(tick);

        heads[stream] = cursors[stream].next();
        if let Some(next) = &heads[stream] {
            heap.push(Reverse((next.ts_micros, stream)));
        }
    }

    merged
}
