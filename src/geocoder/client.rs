//! HTTP geocoding client backed by `reqwest`.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

use super::response::{parse_response, rate_from_headers};
use super::{ApiParams, Geocoder};
use crate::data_model::ResultSet;
use crate::error::GeocodeError;

pub const DEFAULT_API_DOMAIN: &str = "api.opencagedata.com";
const API_PATH: &str = "/geocode/v1/json";

/// Configuration for `HttpGeocoder`.
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub api_key: String,
    pub api_domain: String,
    /// `https` unless explicitly set to `http`.
    pub protocol: String,
    pub request_timeout: Duration,
}

impl GeocoderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_domain: DEFAULT_API_DOMAIN.to_string(),
            protocol: "https".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Geocoding client. Holds one connection pool that every worker shares.
#[derive(Debug, Clone)]
pub struct HttpGeocoder {
    http: reqwest::Client,
    url: String,
    api_key: String,
    request_timeout: Duration,
}

impl HttpGeocoder {
    pub fn new(config: GeocoderConfig) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("GeoBlaster/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let protocol = if config.protocol == "http" { "http" } else { "https" };
        Ok(Self {
            http,
            url: format!("{}://{}{}", protocol, config.api_domain, API_PATH),
            api_key: config.api_key,
            request_timeout: config.request_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_params(&self, query: &str, params: &ApiParams) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(params.len() + 2);
        pairs.push(("q".to_string(), query.to_string()));
        pairs.push(("key".to_string(), self.api_key.clone()));
        pairs.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }

    /// Full request URL with the API key masked.
    pub fn request_url(&self, query: &str, params: &ApiParams) -> String {
        let pairs = self
            .request_params(query, params)
            .into_iter()
            .map(|(k, v)| if k == "key" { (k, "***".to_string()) } else { (k, v) });
        match Url::parse_with_params(&self.url, pairs) {
            Ok(url) => url.to_string(),
            Err(_) => self.url.clone(),
        }
    }

    fn map_error(&self, err: reqwest::Error) -> GeocodeError {
        if err.is_timeout() {
            GeocodeError::Timeout {
                secs: self.request_timeout.as_secs(),
            }
        } else {
            GeocodeError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn forward(&self, query: &str, params: &ApiParams) -> Result<ResultSet, GeocodeError> {
        if query.trim().is_empty() {
            return Err(GeocodeError::InvalidInput(query.to_string()));
        }

        let resp = self
            .http
            .get(&self.url)
            .query(&self.request_params(query, params))
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = resp.status().as_u16();
        let header_rate = rate_from_headers(resp.headers());
        let body = resp.text().await.map_err(|e| self.map_error(e))?;
        debug!(status, bytes = body.len(), "received geocoding response");

        parse_response(status, &body, header_rate)
    }

    fn describe_request(&self, query: &str, params: &ApiParams) -> String {
        self.request_url(query, params)
    }
}
