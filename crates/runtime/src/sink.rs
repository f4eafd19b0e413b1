use std::io;

use crate::engine::RoundOutput;
use crate::execution::PerformanceRecord;
use crate::portfolio::{ExitDirective, PortfolioSnapshot};

pub trait OutputSink {
    fn record_round(&mut self, output: &RoundOutput) -> io::Result<()>;

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub snapshots: Vec<PortfolioSnapshot>,
    pub directives: Vec<ExitDirective>,
    pub trades: Vec<PerformanceRecord>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for RecordingSink {
    fn record_round(&mut self, output: &RoundOutput) -> io::Result<()> {
        self.snapshots.push(output.snapshot.clone());
        self.directives.extend(output.directive.iter().cloned());
        self.trades.extend(output.closed.iter().cloned());
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn record_round(&mut self, _output: &RoundOutput) -> io::Result<()> {
        Ok(())
    }
}
