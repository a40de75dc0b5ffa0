use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Geocoding direction of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Forward,
    Reverse,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Forward => write!(f, "forward"),
            Command::Reverse => write!(f, "reverse"),
        }
    }
}

/// One input row waiting to be geocoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkItem {
    pub row_id: u64,
    pub query: String,
    pub original_fields: Vec<String>,
    pub warnings: Vec<String>,
}

impl WorkItem {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Rate limit information reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<i64>,
}

/// A single result record as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeocodeRecord(pub Map<String, Value>);

impl GeocodeRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        GeocodeRecord(fields)
    }

    /// Follows `path` through nested objects. An empty path is the record itself.
    pub fn group(&self, path: &[String]) -> Option<&Map<String, Value>> {
        let mut current = &self.0;
        for key in path {
            current = current.get(key)?.as_object()?;
        }
        Some(current)
    }

    /// `(lat, lng)` from the `geometry` group, if both are numeric.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let geometry = self.0.get("geometry")?.as_object()?;
        let lat = geometry.get("lat")?.as_f64()?;
        let lng = geometry.get("lng")?.as_f64()?;
        Some((lat, lng))
    }
}

/// Ordered results of one request, with the rate limit state that came along.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub results: Vec<GeocodeRecord>,
    pub rate: Option<RateLimit>,
}

impl ResultSet {
    pub fn first(&self) -> Option<&GeocodeRecord> {
        self.results.first()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Normalized outcome of one query: found with a coordinate pair, or not found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeResult {
    record: Option<GeocodeRecord>,
}

impl GeocodeResult {
    pub fn not_found() -> Self {
        GeocodeResult { record: None }
    }

    /// A record without a coordinate pair counts as not found.
    pub fn from_record(record: Option<GeocodeRecord>) -> Self {
        match record {
            Some(record) if record.coordinates().is_some() => GeocodeResult {
                record: Some(record),
            },
            _ => GeocodeResult::not_found(),
        }
    }

    pub fn found(&self) -> bool {
        self.record.is_some()
    }

    pub fn record(&self) -> Option<&GeocodeRecord> {
        self.record.as_ref()
    }
}
