use std::fs::{self, File};
use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use GeoBlaster::config::{Cli, RunConfig};
use GeoBlaster::error::Result;
use GeoBlaster::executor::{BatchExecutor, BatchSummary};
use GeoBlaster::geocoder::{Geocoder, HttpGeocoder};
use GeoBlaster::pipeline::writers::CsvWriter;
use GeoBlaster::utils::setup_prometheus_metrics;

fn init_tracing(quiet: bool, verbose: bool) {
    let default_directive = if quiet {
        "error"
    } else if verbose {
        "info,GeoBlaster=debug,geoblaster=debug"
    } else {
        "info"
    };
    // RUST_LOG wins when set.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<BatchSummary> {
    let config = RunConfig::resolve(&cli.command)?;
    init_tracing(config.quiet, config.options.verbose);

    setup_prometheus_metrics(config.metrics_port).await?;

    info!(
        command = %config.options.command,
        input = %config.input.display(),
        output = %config.output.display(),
        workers = config.options.workers,
        "GeoBlaster started"
    );

    if config.overwrite && !config.options.dry_run && config.output.exists() {
        fs::remove_file(&config.output)?;
    }

    let geocoder: Arc<dyn Geocoder> = Arc::new(HttpGeocoder::new(config.geocoder.clone())?);
    let input = BufReader::new(File::open(&config.input)?);
    let executor = BatchExecutor::new(config.options.clone(), geocoder);
    let output = config.output.clone();

    executor.run(input, move || CsvWriter::create(&output)).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) => {
            if summary.dry_run && summary.warnings == 0 {
                println!("All good.");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
