// src/config.rs

pub mod batch;
pub mod cli;

pub use batch::{load_batch_config, BatchOptions, FileConfig, DEFAULT_ADD_COLUMNS};
pub use cli::{Cli, CliCommand, GeocodeArgs, RunConfig};
