#![allow(non_snake_case)]

pub mod config;
pub mod data_model;
pub mod error;
pub mod executor;
pub mod geocoder;
pub mod pipeline;
pub mod producer_logic;
pub mod utils;
pub mod worker_logic;

pub use error::{GeocodeError, PipelineError, Result};
