// src/utils/prometheus_metrics.rs

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Gauge, Histogram,
};

// Input side
pub static ROWS_READ_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "geoblaster_rows_read_total",
        "Total number of input rows queued for geocoding."
    )
    .expect("Failed to register ROWS_READ_TOTAL counter")
});

pub static INPUT_WARNINGS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "geoblaster_input_warnings_total",
        "Total number of warnings raised while parsing input rows."
    )
    .expect("Failed to register INPUT_WARNINGS_TOTAL counter")
});

// Requests
pub static GEOCODE_REQUESTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "geoblaster_requests_total",
        "Total number of geocoding requests sent, retries included."
    )
    .expect("Failed to register GEOCODE_REQUESTS_TOTAL counter")
});

pub static GEOCODE_RETRIES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "geoblaster_retries_total",
        "Total number of backoffs after a timed out request."
    )
    .expect("Failed to register GEOCODE_RETRIES_TOTAL counter")
});

pub static GEOCODE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "geoblaster_request_failures_total",
        "Total number of rows whose request failed, by error kind.",
        &["kind"]
    )
    .expect("Failed to register GEOCODE_FAILURES_TOTAL counter")
});

pub static REQUEST_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "geoblaster_request_duration_seconds",
        "Histogram of geocoding request durations, retries included.",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to register REQUEST_DURATION_SECONDS histogram")
});

// Output side
pub static ROWS_WRITTEN_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "geoblaster_rows_written_total",
        "Total number of rows written to the output."
    )
    .expect("Failed to register ROWS_WRITTEN_TOTAL counter")
});

pub static ROWS_NOT_FOUND_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "geoblaster_rows_not_found_total",
        "Total number of rows written without a geocoding result."
    )
    .expect("Failed to register ROWS_NOT_FOUND_TOTAL counter")
});

pub static ACTIVE_WORKERS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "geoblaster_active_workers",
        "Number of workers currently processing a row."
    )
    .expect("Failed to register ACTIVE_WORKERS gauge")
});
