// src/geocoder/mod.rs

pub mod client;
pub mod response;

pub use client::{GeocoderConfig, HttpGeocoder};
pub use response::{floatify_latlng, parse_response};

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::data_model::ResultSet;
use crate::error::GeocodeError;

/// Extra query parameters sent with every request (`language=fr`, `no_annotations=1`, ...).
pub type ApiParams = BTreeMap<String, String>;

/// The request collaborator used by the batch pipeline.
///
/// Implementations are shared by every worker through an `Arc<dyn Geocoder>`, so they
/// must tolerate concurrent calls.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Free-text address to results.
    async fn forward(&self, query: &str, params: &ApiParams) -> Result<ResultSet, GeocodeError>;

    /// Coordinates to results. Both values are passed through verbatim and in order.
    async fn reverse(
        &self,
        lat: &str,
        lng: &str,
        params: &ApiParams,
    ) -> Result<ResultSet, GeocodeError> {
        self.forward(&reverse_query(lat, lng), params).await
    }

    /// Human readable form of a request, used for verbose logging.
    fn describe_request(&self, query: &str, _params: &ApiParams) -> String {
        query.to_string()
    }
}

/// Query string for a reverse lookup. Keeps the caller's decimal places untouched.
pub fn reverse_query(lat: &str, lng: &str) -> String {
    format!("{},{}", lat.trim(), lng.trim())
}
