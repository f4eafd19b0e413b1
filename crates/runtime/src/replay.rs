use std::io::{self, Write};

use serde::Serialize;

use crate::engine::RoundOutput;
use crate::execution::PerformanceRecord;
use crate::logging::{RunLogEvent, RunLogEventKind, RunLogWriter};
use crate::portfolio::PortfolioSnapshot;
use crate::sink::OutputSink;

pub const TRADES_CSV_HEADER: &str = "strategy_id,instrument,side,size,entry_round,exit_round,entry_ts_micros,exit_ts_micros,holding_micros,entry_price,exit_price,mfe,mae,realized_pnl,reason\n";

pub const SNAPSHOTS_CSV_HEADER: &str =
    "round,ts_micros,instrument,unrealized_pnl,mfe_peak,mae_trough,drawdown,open_positions,episode\n";

pub struct ReplayCsvWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReplayCsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_header(&mut self, header: &str) -> io::Result<()> {
        self.writer.write_all(header.as_bytes())
    }

    pub fn write_header_and_log(
        &mut self,
        header: &str,
        round: u64,
        run_log_writer: &mut dyn RunLogWriter,
    ) -> io::Result<()> {
        self.write_header(header)?;
        self.writer.flush()?;
        run_log_writer.write(RunLogEvent::new(
            round,
            RunLogEventKind::ReplayArtifactWritten,
            None,
        ));
        Ok(())
    }

    pub fn append_trades(&mut self, records: &[PerformanceRecord]) -> io::Result<()> {
        for record in records {
            let strategy_id = escape_csv_field(record.strategy_id.as_str());
            let instrument = escape_csv_field(record.instrument.as_str());
            let side = match record.side {
                core_sim::Side::Long => "long",
                core_sim::Side::Short => "short",
            };
            writeln!(
                self.writer,
                "{strategy_id},{instrument},{side},{},{},{},{},{},{},{},{},{},{},{},{}",
                record.size,
                record.entry_round,
                record.exit_round,
                record.entry_ts_micros,
                record.exit_ts_micros,
                record.holding_micros,
                record.entry_price,
                record.exit_price,
                record.mfe,
                record.mae,
                record.realized_pnl,
                record.reason.as_str(),
            )?;
        }
        Ok(())
    }

    pub fn append_snapshot(&mut self, snapshot: &PortfolioSnapshot) -> io::Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{}",
            snapshot.round,
            snapshot.ts_micros,
            escape_csv_field(snapshot.instrument.as_str()),
            snapshot.unrealized_pnl,
            snapshot.mfe_peak,
            snapshot.mae_trough,
            snapshot.drawdown,
            snapshot.open_positions,
            snapshot.episode,
        )
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub struct JsonLinesWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn append<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub struct ReplayArtifacts<W: Write> {
    pub trades: ReplayCsvWriter<W>,
    pub snapshots: ReplayCsvWriter<W>,
    pub snapshot_records: JsonLinesWriter<W>,
    pub directives: JsonLinesWriter<W>,
}

impl<W: Write> ReplayArtifacts<W> {
    pub fn new(trades: W, snapshots: W, snapshot_records: W, directives: W) -> Self {
        Self {
            trades: ReplayCsvWriter::new(trades),
            snapshots: ReplayCsvWriter::new(snapshots),
            snapshot_records: JsonLinesWriter::new(snapshot_records),
            directives: JsonLinesWriter::new(directives),
        }
    }

    pub fn write_headers_and_log(&mut self, run_log_writer: &mut dyn RunLogWriter) -> io::Result<()> {
        self.trades
            .write_header_and_log(TRADES_CSV_HEADER, 0, run_log_writer)?;
        self.snapshots
            .write_header_and_log(SNAPSHOTS_CSV_HEADER, 0, run_log_writer)
    }
}

impl<W: Write> OutputSink for ReplayArtifacts<W> {
    fn record_round(&mut self, output: &RoundOutput) -> io::Result<()> {
        self.snapshots.append_snapshot(&output.snapshot)?;
        self.snapshot_records.append(&output.snapshot)?;
        if let Some(directive) = &output.directive {
            self.directives.append(directive)?;
        }
        self.trades.append_trades(&output.closed)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.trades.flush()?;
        self.snapshots.flush()?;
        self.snapshot_records.flush()?;
        self.directives.flush()
    }
}

fn escape_csv_field(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| matches!(ch, ',' | '"' | '\n' | '\r'));
    if !needs_quotes {
        return value.to_string();
    }

    let escaped = value.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, io, rc::Rc};

    use core_sim::{InstrumentId, Side, StrategyId};

    use crate::execution::PerformanceRecord;
    use crate::logging::{InMemoryRunLogWriter, RunLogEvent, RunLogEventKind, RunLogWriter};
    use crate::portfolio::ExitReason;

    use super::{JsonLinesWriter, ReplayCsvWriter, TRADES_CSV_HEADER};

    struct TrackingWriter {
        bytes: Vec<u8>,
        flush_called: Rc<Cell<bool>>,
        flush_fails: bool,
    }

    impl TrackingWriter {
        fn new(flush_called: Rc<Cell<bool>>, flush_fails: bool) -> Self {
            Self {
                bytes: Vec::new(),
                flush_called,
                flush_fails,
            }
        }
    }

    impl io::Write for TrackingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flush_called.set(true);
            if self.flush_fails {
                return Err(io::Error::other("flush failed"));
            }
            Ok(())
        }
    }

    struct FlushAssertingLogWriter {
        flush_called: Rc<Cell<bool>>,
    }

    impl RunLogWriter for FlushAssertingLogWriter {
        fn write(&mut self, _event: RunLogEvent) {
            assert!(
                self.flush_called.get(),
                "expected writer flush before logging"
            );
        }
    }

    fn record(strategy: &str) -> PerformanceRecord {
        PerformanceRecord {
            strategy_id: StrategyId::new(strategy),
            instrument: InstrumentId::new("ES"),
            side: Side::Long,
            size: 1.0,
            entry_round: 2,
            exit_round: 8,
            entry_ts_micros: 2_000,
            exit_ts_micros: 8_000,
            holding_micros: 6_000,
            entry_price: 100.0,
            exit_price: 104.0,
            mfe: 10.0,
            mae: 0.0,
            realized_pnl: 4.0,
            reason: ExitReason::PortfolioMfeRetrace,
        }
    }

    #[test]
    fn write_header_and_log_flushes_before_emitting_log() {
        let flush_called = Rc::new(Cell::new(false));
        let writer = TrackingWriter::new(Rc::clone(&flush_called), false);
        let mut replay_writer = ReplayCsvWriter::new(writer);
        let mut log_writer = FlushAssertingLogWriter { flush_called };

        replay_writer
            .write_header_and_log(TRADES_CSV_HEADER, 7, &mut log_writer)
            .expect("header write should flush and log");
    }

    #[test]
    fn write_header_and_log_propagates_flush_errors() {
        let flush_called = Rc::new(Cell::new(false));
        let writer = TrackingWriter::new(Rc::clone(&flush_called), true);
        let mut replay_writer = ReplayCsvWriter::new(writer);
        let mut log_writer = InMemoryRunLogWriter::new();

        let err = replay_writer
            .write_header_and_log(TRADES_CSV_HEADER, 3, &mut log_writer)
            .expect_err("flush failure should be returned");

        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(log_writer.events().len(), 0);
    }

    #[test]
    fn write_header_and_log_uses_round_from_caller() {
        let mut output = Vec::new();
        let mut replay_writer = ReplayCsvWriter::new(&mut output);
        let mut log_writer = InMemoryRunLogWriter::new();

        replay_writer
            .write_header_and_log(TRADES_CSV_HEADER, 42, &mut log_writer)
            .expect("header and log write should succeed");

        assert_eq!(String::from_utf8(output).unwrap(), TRADES_CSV_HEADER);
        assert_eq!(log_writer.events()[0].round, 42);
        assert_eq!(
            log_writer.events()[0].kind,
            RunLogEventKind::ReplayArtifactWritten
        );
    }

    #[test]
    fn trade_rows_follow_header_columns() {
        let mut output = Vec::new();
        let mut writer = ReplayCsvWriter::new(&mut output);
        writer.write_header(TRADES_CSV_HEADER).unwrap();
        writer.append_trades(&[record("band")]).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("{TRADES_CSV_HEADER}band,ES,long,1,2,8,2000,8000,6000,100,104,10,0,4,portfolio_mfe_retrace\n")
        );
    }

    #[test]
    fn strategy_ids_are_escaped_with_csv_rules() {
        let mut output = Vec::new();
        let mut writer = ReplayCsvWriter::new(&mut output);
        writer.append_trades(&[record("band,\"fast\"")]).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert!(csv.starts_with("\"band,\"\"fast\"\"\",ES,long,"));
    }

    #[test]
    fn json_lines_writes_one_record_per_line() {
        let mut output = Vec::new();
        let mut writer = JsonLinesWriter::new(&mut output);
        writer.append(&record("a")).unwrap();
        writer.append(&record("b")).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["strategy_id"], "b");
        assert_eq!(second["reason"], "portfolio_mfe_retrace");
    }
}
