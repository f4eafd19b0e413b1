use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use core_sim::{InstrumentId, Tick};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open tick file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read tick csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: timestamp {value:?} is neither integer microseconds nor RFC 3339")]
    InvalidTimestamp { row: u64, value: String },
}

pub trait TickSource {
    fn next_tick(&mut self) -> Result<Option<Tick>, SourceError>;
}

#[derive(Debug, Clone)]
pub struct VecTickSource {
    ticks: Arc<Vec<Tick>>,
    position: usize,
}

impl VecTickSource {
    pub fn new(ticks: Arc<Vec<Tick>>) -> Self {
        Self { ticks, position: 0 }
    }

    pub fn from_ticks(ticks: Vec<Tick>) -> Self {
        Self::new(Arc::new(ticks))
    }

    pub fn remaining(&self) -> usize {
        self.ticks.len().saturating_sub(self.position)
    }
}

impl TickSource for VecTickSource {
    fn next_tick(&mut self) -> Result<Option<Tick>, SourceError> {
        let tick = self.ticks.get(self.position).cloned();
        if tick.is_some() {
            self.position += 1;
        }
        Ok(tick)
    }
}

#[derive(Debug, Deserialize)]
struct TickRow {
    instrument: String,
    timestamp: String,
    sequence: u64,
    price: f64,
    bid: Option<f64>,
    ask: Option<f64>,
}

pub struct CsvTickSource<R: Read> {
    records: csv::DeserializeRecordsIntoIter<R, TickRow>,
    row: u64,
}

impl CsvTickSource<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> CsvTickSource<R> {
    pub fn from_reader(reader: R) -> Self {
        let records = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader)
            .into_deserialize();
        Self { records, row: 0 }
    }
}

impl<R: Read> TickSource for CsvTickSource<R> {
    fn next_tick(&mut self) -> Result<Option<Tick>, SourceError> {
        let Some(record) = self.records.next() else {
            return Ok(None);
        };
        self.row += 1;
        let row = record?;

        let ts_micros =
            parse_timestamp_micros(&row.timestamp).ok_or(SourceError::InvalidTimestamp {
                row: self.row,
                value: row.timestamp.clone(),
            })?;

        Ok(Some(Tick {
            instrument: InstrumentId::new(row.instrument),
            ts_micros,
            seq: row.sequence,
            price: row.price,
            bid: row.bid,
            ask: row.ask,
        }))
    }
}

pub fn parse_timestamp_micros(value: &str) -> Option<u64> {
    if !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit()) {
        return value.parse().ok();
    }

    let parsed = OffsetDateTime::parse(value, &Rfc3339).ok()?;
    u64::try_from(parsed.unix_timestamp_nanos() / 1_000).ok()
}
