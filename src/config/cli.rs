// src/config/cli.rs

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::batch::{load_batch_config, BatchOptions, FileConfig};
use crate::data_model::Command;
use crate::error::{PipelineError, Result};
use crate::geocoder::{ApiParams, GeocoderConfig};
use crate::pipeline::OutputOrder;

static API_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(oc_gc_)?[0-9a-f]{32}$").expect("API key regex is valid"));

// Define command-line arguments
#[derive(Parser, Debug)]
#[command(name = "geoblaster", author, version, about = "Batch geocoding of CSV files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Forward geocode a file (input is address, add coordinates)
    Forward(GeocodeArgs),
    /// Reverse geocode a file (input is coordinates, add full address)
    Reverse(GeocodeArgs),
}

impl CliCommand {
    pub fn command(&self) -> Command {
        match self {
            CliCommand::Forward(_) => Command::Forward,
            CliCommand::Reverse(_) => Command::Reverse,
        }
    }

    pub fn args(&self) -> &GeocodeArgs {
        match self {
            CliCommand::Forward(args) | CliCommand::Reverse(args) => args,
        }
    }
}

/// Comma separated list of 1-based column numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnList(pub Vec<usize>);

#[derive(Args, Debug, Clone)]
pub struct GeocodeArgs {
    /// Your API key
    #[arg(long, value_parser = parse_api_key)]
    pub api_key: String,

    /// Input file name
    #[arg(long, value_name = "FILENAME")]
    pub input: PathBuf,

    /// Output file name
    #[arg(long, value_name = "FILENAME")]
    pub output: PathBuf,

    /// Treat the first row as a header row
    #[arg(long)]
    pub headers: bool,

    /// Comma-separated list of input columns (default '1', '1,2' for reverse)
    #[arg(long, value_parser = parse_column_list)]
    pub input_columns: Option<ColumnList>,

    /// Comma-separated list of output columns
    #[arg(long, value_delimiter = ',')]
    pub add_columns: Option<Vec<String>>,

    /// Number of parallel geocoding requests (default 1)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=20))]
    pub workers: Option<u64>,

    /// Timeout in seconds (default 10)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=60))]
    pub timeout: Option<u64>,

    /// Number of attempts per request (default 10)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=60))]
    pub retries: Option<u32>,

    /// API domain (default api.opencagedata.com)
    #[arg(long)]
    pub api_domain: Option<String>,

    /// Extra parameters for each request (e.g. language=fr,no_dedupe=1)
    #[arg(long, value_parser = parse_api_params)]
    pub optional_api_params: Option<ApiParams>,

    /// Stop after this number of lines in the input
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Allow the output lines to be in different order (can be faster)
    #[arg(long)]
    pub unordered: bool,

    /// Read the input file but no geocoding
    #[arg(long)]
    pub dry_run: bool,

    /// Display no progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// No progress bar and no messages
    #[arg(long)]
    pub quiet: bool,

    /// Delete the output file first if it exists
    #[arg(long)]
    pub overwrite: bool,

    /// Display debug information for each request
    #[arg(long)]
    pub verbose: bool,

    /// Optional YAML file with defaults for the options above
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Optional: Port for the Prometheus metrics HTTP endpoint
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

pub fn parse_api_key(value: &str) -> std::result::Result<String, String> {
    if API_KEY_RE.is_match(value) {
        Ok(value.to_string())
    } else {
        Err("invalid API key".to_string())
    }
}

/// Accepts `""` as the empty list, which selects every column.
pub fn parse_column_list(value: &str) -> std::result::Result<ColumnList, String> {
    if value.trim().is_empty() {
        return Ok(ColumnList(Vec::new()));
    }
    value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| format!("'{}' is not a column number", part.trim()))
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(ColumnList)
}

pub fn parse_api_params(value: &str) -> std::result::Result<ApiParams, String> {
    let mut params = ApiParams::new();
    if value.trim().is_empty() {
        return Ok(params);
    }
    for pair in value.split(',') {
        match pair.split_once('=') {
            Some((key, val)) if !key.trim().is_empty() && !val.contains('=') => {
                params.insert(key.trim().to_string(), val.trim().to_string());
            }
            _ => return Err("must be a valid comma separated list of key=value pairs".to_string()),
        }
    }
    Ok(params)
}

/// Fully resolved settings for one run: defaults, then the YAML file, then flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub options: BatchOptions,
    pub geocoder: GeocoderConfig,
    pub input: PathBuf,
    pub output: PathBuf,
    pub overwrite: bool,
    pub quiet: bool,
    pub metrics_port: Option<u16>,
}

impl RunConfig {
    pub fn resolve(cli: &CliCommand) -> Result<Self> {
        let args = cli.args();
        let file = match &args.config {
            Some(path) => load_batch_config(path)?,
            None => FileConfig::default(),
        };
        Self::resolve_with(cli.command(), args, &file)
    }

    pub fn resolve_with(command: Command, args: &GeocodeArgs, file: &FileConfig) -> Result<Self> {
        let mut options = BatchOptions::new(command);
        let mut geocoder = GeocoderConfig::new(args.api_key.clone());
        file.apply(&mut options, &mut geocoder);

        if let Some(ColumnList(columns)) = &args.input_columns {
            options.input_columns = columns.clone();
        }
        if let Some(columns) = &args.add_columns {
            options.add_columns = columns
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(workers) = args.workers {
            options.workers = workers as usize;
        }
        if let Some(timeout) = args.timeout {
            geocoder.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(retries) = args.retries {
            options.retry.max_tries = retries;
        }
        if let Some(domain) = &args.api_domain {
            geocoder.api_domain = domain.clone();
        }
        if let Some(params) = &args.optional_api_params {
            options
                .api_params
                .extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        options.headers = args.headers;
        options.limit = args.limit;
        options.order = if args.unordered {
            OutputOrder::Unordered
        } else {
            OutputOrder::Ordered
        };
        options.dry_run = args.dry_run;
        options.show_progress = !(args.no_progress || args.quiet);
        options.verbose = args.verbose;

        options.validate()?;

        if !args.input.is_file() {
            return Err(PipelineError::ConfigValidationError(format!(
                "The input file '{}' does not exist.",
                args.input.display()
            )));
        }
        if args.output.exists() && !args.overwrite && !args.dry_run {
            return Err(PipelineError::ConfigValidationError(format!(
                "The output file '{}' already exists. You can add --overwrite to your command.",
                args.output.display()
            )));
        }

        Ok(RunConfig {
            options,
            geocoder,
            input: args.input.clone(),
            output: args.output.clone(),
            overwrite: args.overwrite,
            quiet: args.quiet,
            metrics_port: args.metrics_port,
        })
    }
}
