mod config;
mod roster;
mod wiring;

use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use runtime::logging::{RunLogWriter, TracingRunLogWriter};
use runtime::replay::ReplayArtifacts;
use runtime::CsvTickSource;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TRADES_FILE: &str = "trades.csv";
const SNAPSHOTS_FILE: &str = "snapshots.csv";
const SNAPSHOT_RECORDS_FILE: &str = "snapshots.jsonl";
const DIRECTIVES_FILE: &str = "directives.jsonl";
const REPORT_FILE: &str = "report.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::from_env()?;
    let roster = roster::Roster::load(&config.strategies_path)?;
    let mut engine = wiring::build_engine(&config, &roster)?;

    let mut log = TracingRunLogWriter;
    let mut artifacts = initialize_artifacts(&config.output_dir, &mut log)?;
    let mut source = CsvTickSource::from_path(&config.ticks_path)?;

    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current round");
            cancel.cancel();
        }
    });

    let report = engine.run(&mut source, &mut artifacts, &mut log).await?;

    let report_path = Path::new(&config.output_dir).join(REPORT_FILE);
    let mut report_writer = BufWriter::new(File::create(&report_path)?);
    serde_json::to_writer_pretty(&mut report_writer, &report)?;
    report_writer.flush()?;
    info!(path = %report_path.display(), "report written");
    Ok(())
}

fn initialize_artifacts(
    output_dir: &str,
    log: &mut dyn RunLogWriter,
) -> Result<ReplayArtifacts<BufWriter<File>>, std::io::Error> {
    let dir = Path::new(output_dir);
    fs::create_dir_all(dir)?;

    let create = |name: &str| File::create(dir.join(name)).map(BufWriter::new);
    let mut artifacts = ReplayArtifacts::new(
        create(TRADES_FILE)?,
        create(SNAPSHOTS_FILE)?,
        create(SNAPSHOT_RECORDS_FILE)?,
        create(DIRECTIVES_FILE)?,
    );
    artifacts.write_headers_and_log(log)?;
    Ok(artifacts)
}
