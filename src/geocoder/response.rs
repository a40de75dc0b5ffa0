use chrono::DateTime;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

use crate::data_model::{GeocodeRecord, RateLimit, ResultSet};
use crate::error::GeocodeError;

/// Maps an HTTP status and body to a result set or a typed error.
///
/// `header_rate` is used when the body carries no `rate` object.
pub fn parse_response(
    status: u16,
    body: &str,
    header_rate: Option<RateLimit>,
) -> Result<ResultSet, GeocodeError> {
    match status {
        401 => return Err(GeocodeError::NotAuthorized),
        403 => return Err(GeocodeError::Forbidden),
        s if s >= 500 => return Err(GeocodeError::Server(format!("{s} status code from API"))),
        _ => {}
    }

    let json: Option<Value> = serde_json::from_str(body).ok();
    let rate = json.as_ref().and_then(rate_from_body).or(header_rate);

    if status == 402 || status == 429 {
        return Err(GeocodeError::RateLimitExceeded {
            reset_to: rate.and_then(|r| r.limit).unwrap_or_default(),
            reset_time: rate
                .and_then(|r| r.reset)
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        });
    }

    let json = json.ok_or_else(|| GeocodeError::Parse("Non-JSON result from server".to_string()))?;

    if !(200..300).contains(&status) {
        let message = json
            .pointer("/status/message")
            .and_then(Value::as_str)
            .unwrap_or("unexpected response");
        return Err(GeocodeError::Server(format!(
            "{status} status code from API: {message}"
        )));
    }

    let results = match json.get("results") {
        Some(Value::Array(items)) => items.clone(),
        // An empty object shows up for some queries with nothing to report.
        Some(Value::Object(items)) if items.is_empty() => Vec::new(),
        _ => {
            return Err(GeocodeError::Parse(
                "JSON from API doesn't have a 'results' key".to_string(),
            ))
        }
    };

    let results = results
        .into_iter()
        .map(floatify_latlng)
        .filter_map(|value| match value {
            Value::Object(fields) => Some(GeocodeRecord::new(fields)),
            _ => None,
        })
        .collect();

    Ok(ResultSet { results, rate })
}

fn rate_from_body(json: &Value) -> Option<RateLimit> {
    let rate = json.get("rate")?.as_object()?;
    Some(RateLimit {
        limit: rate.get("limit").and_then(Value::as_u64),
        remaining: rate.get("remaining").and_then(Value::as_u64),
        reset: rate.get("reset").and_then(Value::as_i64),
    })
}

/// Reads the `X-RateLimit-*` headers. `None` when none of them are present.
pub fn rate_from_headers(headers: &HeaderMap) -> Option<RateLimit> {
    fn header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
        headers.get(name)?.to_str().ok()?.trim().parse().ok()
    }

    let rate = RateLimit {
        limit: header(headers, "x-ratelimit-limit"),
        remaining: header(headers, "x-ratelimit-remaining"),
        reset: header(headers, "x-ratelimit-reset"),
    };
    if rate == RateLimit::default() {
        None
    } else {
        Some(rate)
    }
}

/// Any object consisting of exactly `lat` and `lng` gets its string values turned
/// into floats where they parse. Everything else is returned unchanged.
pub fn floatify_latlng(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 2 && map.contains_key("lat") && map.contains_key("lng") {
                let mut out = Map::with_capacity(2);
                for (key, v) in map {
                    out.insert(key, float_if_float(v));
                }
                Value::Object(out)
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(key, v)| (key, floatify_latlng(v)))
                        .collect(),
                )
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(floatify_latlng).collect()),
        other => other,
    }
}

fn float_if_float(value: Value) -> Value {
    if let Value::String(s) = &value {
        if let Some(number) = s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(number);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn floatify_leaves_plain_values_alone() {
        assert_eq!(floatify_latlng(json!("123")), json!("123"));
        assert_eq!(floatify_latlng(json!({})), json!({}));
        assert_eq!(floatify_latlng(json!([])), json!([]));
        assert_eq!(
            floatify_latlng(json!([{"foo": "bar"}])),
            json!([{"foo": "bar"}])
        );
    }

    #[test]
    fn floatify_converts_stringified_coordinates() {
        let input = json!({
            "results": [
                {"geom": {"lat": "12.01", "lng": "-0.9"}},
                {"geometry": {"lat": "0.1", "lng": "10"}}
            ]
        });
        let expected = json!({
            "results": [
                {"geom": {"lat": 12.01, "lng": -0.9}},
                {"geometry": {"lat": 0.1, "lng": 10.0}}
            ]
        });
        assert_eq!(floatify_latlng(input), expected);
    }

    #[test]
    fn floatify_ignores_objects_with_extra_keys() {
        let input = json!({"lat": "1", "lng": "2", "name": "x"});
        assert_eq!(floatify_latlng(input.clone()), input);
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert_eq!(parse_response(401, "{}", None), Err(GeocodeError::NotAuthorized));
        assert_eq!(parse_response(403, "{}", None), Err(GeocodeError::Forbidden));
        assert_eq!(
            parse_response(500, "", None),
            Err(GeocodeError::Server("500 status code from API".to_string()))
        );
    }

    #[test]
    fn non_json_and_missing_results_are_parse_errors() {
        assert_eq!(
            parse_response(200, "", None),
            Err(GeocodeError::Parse("Non-JSON result from server".to_string()))
        );
        assert_eq!(
            parse_response(200, r#"{"spam": "eggs"}"#, None),
            Err(GeocodeError::Parse(
                "JSON from API doesn't have a 'results' key".to_string()
            ))
        );
    }

    #[test]
    fn rate_limit_exceeded_reads_body_rate() {
        let body = r#"{"rate": {"limit": 2500, "remaining": 0, "reset": 1615161600}, "results": []}"#;
        let err = parse_response(402, body, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Your rate limit has expired. It will reset to 2500 on 2021-03-08T00:00:00"
        );
    }

    #[test]
    fn rate_limit_falls_back_to_headers() {
        let header_rate = RateLimit {
            limit: Some(2500),
            remaining: Some(2487),
            reset: Some(1615161600),
        };
        let set = parse_response(200, r#"{"results": []}"#, Some(header_rate)).unwrap();
        assert_eq!(set.rate, Some(header_rate));
        assert!(set.is_empty());
    }

    #[test]
    fn results_become_records() {
        let body = r#"{
            "rate": {"limit": 10000, "remaining": 9999, "reset": 1},
            "results": [
                {"confidence": 9, "geometry": {"lat": "51.95", "lng": "7.63"},
                 "components": {"country": "Germany"}},
                {"confidence": 5, "geometry": {"lat": 1.0, "lng": 2.0}}
            ]
        }"#;
        let set = parse_response(200, body, None).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.first().unwrap().coordinates(), Some((51.95, 7.63)));
        assert_eq!(set.rate.unwrap().limit, Some(10000));
    }

    #[test]
    fn empty_results_object_is_no_results() {
        let set = parse_response(200, r#"{"results": {}}"#, None).unwrap();
        assert!(set.is_empty());
    }
}
