// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use GeoBlaster::data_model::{GeocodeRecord, RateLimit, ResultSet};
use GeoBlaster::error::{GeocodeError, PipelineError, Result};
use GeoBlaster::executor::PROBE_QUERY;
use GeoBlaster::geocoder::{ApiParams, Geocoder};
use GeoBlaster::pipeline::writers::BaseWriter;

pub fn record(lat: f64, lng: f64) -> GeocodeRecord {
    match json!({
        "confidence": 9,
        "geometry": {"lat": lat, "lng": lng},
        "components": {"country": "Testland"}
    }) {
        serde_json::Value::Object(map) => GeocodeRecord::new(map),
        _ => unreachable!(),
    }
}

/// Answers from a fixed table. Unknown queries get an empty result set.
#[derive(Default)]
pub struct StubGeocoder {
    pub answers: HashMap<String, (f64, f64)>,
    pub delays: HashMap<String, Duration>,
    /// Queries that time out this many times before answering.
    pub timeouts: HashMap<String, u32>,
    pub errors: HashMap<String, GeocodeError>,
    pub panics_on: Option<String>,
    pub rate_limit: Option<u64>,
    pub probe_error: Option<GeocodeError>,
    pub calls: Mutex<Vec<String>>,
}

impl StubGeocoder {
    pub fn new() -> Self {
        StubGeocoder {
            rate_limit: Some(10_000),
            ..Default::default()
        }
    }

    pub fn answer(mut self, query: &str, lat: f64, lng: f64) -> Self {
        self.answers.insert(query.to_string(), (lat, lng));
        self
    }

    pub fn delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn time_out(mut self, query: &str, times: u32) -> Self {
        self.timeouts.insert(query.to_string(), times);
        self
    }

    pub fn fail(mut self, query: &str, err: GeocodeError) -> Self {
        self.errors.insert(query.to_string(), err);
        self
    }

    pub fn rate_limit(mut self, limit: Option<u64>) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn probe_error(mut self, err: GeocodeError) -> Self {
        self.probe_error = Some(err);
        self
    }

    pub fn panics_on(mut self, query: &str) -> Self {
        self.panics_on = Some(query.to_string());
        self
    }

    /// Every query received, probe included, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than the probe.
    pub fn row_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|q| q != PROBE_QUERY)
            .collect()
    }

    fn rate(&self) -> Option<RateLimit> {
        self.rate_limit.map(|limit| RateLimit {
            limit: Some(limit),
            remaining: Some(limit - 1),
            reset: Some(1_615_161_600),
        })
    }
}

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn forward(&self, query: &str, _params: &ApiParams) -> std::result::Result<ResultSet, GeocodeError> {
        let previous_calls = {
            let mut calls = self.calls.lock().unwrap();
            let previous = calls.iter().filter(|q| q.as_str() == query).count() as u32;
            calls.push(query.to_string());
            previous
        };

        if query == PROBE_QUERY {
            if let Some(err) = &self.probe_error {
                return Err(err.clone());
            }
            return Ok(ResultSet {
                results: vec![record(42.36, -71.08)],
                rate: self.rate(),
            });
        }

        if self.panics_on.as_deref() == Some(query) {
            panic!("stub geocoder asked to panic on {query}");
        }
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(times) = self.timeouts.get(query) {
            if previous_calls < *times {
                return Err(GeocodeError::Timeout { secs: 1 });
            }
        }
        if let Some(err) = self.errors.get(query) {
            return Err(err.clone());
        }

        let results = match self.answers.get(query) {
            Some((lat, lng)) => vec![record(*lat, *lng)],
            None => Vec::new(),
        };
        Ok(ResultSet {
            results,
            rate: self.rate(),
        })
    }
}

/// Keeps written rows in memory; clones share the same rows.
#[derive(Clone, Default)]
pub struct CollectingWriter {
    pub rows: Arc<Mutex<Vec<Vec<String>>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl CollectingWriter {
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl BaseWriter for CollectingWriter {
    fn write_row(&mut self, row: &[String]) -> Result<()> {
        self.rows.lock().unwrap().push(row.to_vec());
        Ok(())
    }

    fn close(self) -> Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Fails every write after the first `ok_rows`.
pub struct FailingWriter {
    pub ok_rows: usize,
    pub written: usize,
}

impl BaseWriter for FailingWriter {
    fn write_row(&mut self, _row: &[String]) -> Result<()> {
        if self.written >= self.ok_rows {
            return Err(PipelineError::IoError {
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        self.written += 1;
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}
