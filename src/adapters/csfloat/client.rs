//! CSFloat Listings Client
//!
//! Fetches one page of the most recent listings and extracts the
//! out-of-band rate limit headers. A single request per call; pacing and
//! backoff live in the rate controller, not here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::domain::Listing;
use crate::ports::listing_source::{
    FetchError, ListingPage, ListingSource, PageRequest, RateLimitInfo, DEFAULT_RATE_REMAINING,
    DEFAULT_RATE_RESET_SECS,
};

pub const DEFAULT_API_BASE_URL: &str = "https://csfloat.com";
pub const LISTINGS_PATH: &str = "/api/v1/listings";
pub const DEFAULT_USER_AGENT: &str = "CSFloatMonitor/2.0 (Personal Project)";

const HEADER_RATE_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RATE_RESET: &str = "x-ratelimit-reset";

/// Reset values above this are absolute unix timestamps, not deltas
const EPOCH_THRESHOLD: u64 = 1_000_000_000;

/// Max bytes of an error body kept for logging
const ERROR_BODY_LIMIT: usize = 200;

/// CSFloat client configuration
#[derive(Debug, Clone)]
pub struct CsfloatConfig {
    /// Scheme + host, without the listings path
    pub api_base_url: String,
    /// Sent verbatim in the Authorization header
    pub api_key: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for CsfloatConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Listing source backed by the CSFloat public API
#[derive(Debug, Clone)]
pub struct CsfloatClient {
    config: CsfloatConfig,
    http: Client,
}

impl CsfloatClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(CsfloatConfig::default())
    }

    pub fn with_config(config: CsfloatConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &CsfloatConfig {
        &self.config
    }

    fn listings_url(&self) -> String {
        format!(
            "{}{}",
            self.config.api_base_url.trim_end_matches('/'),
            LISTINGS_PATH
        )
    }

    /// Map a response into a page or a classified error
    async fn handle_response(&self, response: reqwest::Response) -> Result<ListingPage, FetchError> {
        let status = response.status();
        let headers = response.headers().clone();
        let remaining = parse_remaining(&headers);

        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset_secs = parse_reset(&headers, unix_now()).unwrap_or(DEFAULT_RATE_RESET_SECS);
            return Err(FetchError::RateLimited { reset_secs, remaining });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
                remaining,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read body: {}", e)))?;

        let listings = parse_listings(&body).map_err(|reason| FetchError::Malformed {
            reason,
            remaining,
        })?;

        Ok(ListingPage {
            listings,
            rate: RateLimitInfo {
                remaining: remaining.unwrap_or(DEFAULT_RATE_REMAINING),
                status: status.as_u16(),
                reset_secs: parse_reset(&headers, unix_now()).unwrap_or(0),
            },
        })
    }
}

#[async_trait]
impl ListingSource for CsfloatClient {
    fn name(&self) -> &str {
        "csfloat"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<ListingPage, FetchError> {
        let mut req = self
            .http
            .get(self.listings_url())
            .header(ACCEPT, "application/json")
            .query(&[
                ("sort_by", request.sort_by.clone()),
                ("limit", request.limit.to_string()),
                ("type", request.listing_type.clone()),
                ("min_price", request.min_price.to_string()),
            ]);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header(AUTHORIZATION, api_key);
        }

        tracing::debug!("GET {} limit={}", self.listings_url(), request.limit);

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Network("request timed out".to_string())
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        self.handle_response(response).await
    }
}

/// Remaining request budget, if the header is present and numeric
pub fn parse_remaining(headers: &HeaderMap) -> Option<u32> {
    header_u64(headers, HEADER_RATE_REMAINING).map(|v| v.min(u32::MAX as u64) as u32)
}

/// Seconds until the rate limit window resets.
///
/// Accepts either a delta in seconds or an absolute unix timestamp.
pub fn parse_reset(headers: &HeaderMap, now: u64) -> Option<u64> {
    header_u64(headers, HEADER_RATE_RESET).map(|v| {
        if v > EPOCH_THRESHOLD {
            v.saturating_sub(now)
        } else {
            v
        }
    })
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    // Some proxies send "12.0"
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

/// Decode a listings payload.
///
/// The item array lives under `data`, or `listings` on older responses. A
/// bare array is accepted as well. A `null` item list counts as empty. Any
/// entry that fails to decode rejects the whole page.
pub fn parse_listings(body: &str) -> Result<Vec<Listing>, String> {
    let value: Value = serde_json::from_str(body).map_err(|e| format!("invalid JSON: {}", e))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match take_non_null(&mut map, "data")
            .or_else(|| take_non_null(&mut map, "listings"))
        {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(format!("item list is not an array (got {})", json_kind(&other)));
            }
            None => {
                let keys: Vec<&String> = map.keys().collect();
                tracing::warn!("Unknown listings response shape, keys: {:?}", keys);
                Vec::new()
            }
        },
        other => return Err(format!("unexpected top-level {}", json_kind(&other))),
    };

    let total = items.len();
    let mut listings = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        let listing = serde_json::from_value::<Listing>(item)
            .map_err(|e| format!("listing {} of {} failed to decode: {}", index, total, e))?;
        listings.push(listing);
    }
    Ok(listings)
}

fn take_non_null(map: &mut serde_json::Map<String, Value>, key: &str) -> Option<Value> {
    map.remove(key).filter(|value| !value.is_null())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    const LISTING_JSON: &str = r#"{
        "id": "924861",
        "price": 45000,
        "type": "buy_now",
        "item": {
            "market_hash_name": "AK-47 | Redline (Field-Tested)",
            "float_value": 0.2134,
            "paint_seed": 661
        },
        "reference": { "base_price": 50000, "predicted_price": 52000 }
    }"#;

    #[test]
    fn test_parse_listings_data_key() {
        let body = format!(r#"{{"data": [{}]}}"#, LISTING_JSON);
        let listings = parse_listings(&body).unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id, "924861");
        assert_eq!(listings[0].price, 45000);
        assert_eq!(listings[0].item.paint_seed, Some(661));
    }

    #[test]
    fn test_parse_listings_legacy_key_and_bare_array() {
        let legacy = format!(r#"{{"listings": [{}]}}"#, LISTING_JSON);
        assert_eq!(parse_listings(&legacy).unwrap().len(), 1);

        let bare = format!("[{}]", LISTING_JSON);
        assert_eq!(parse_listings(&bare).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_listings_unknown_shape_is_empty() {
        let listings = parse_listings(r#"{"cursor": "abc"}"#).unwrap();
        assert!(listings.is_empty());
    }

    #[test]
    fn test_parse_listings_malformed() {
        assert!(parse_listings("<html>").is_err());
        assert!(parse_listings(r#"{"data": "nope"}"#).is_err());
        assert!(parse_listings("42").is_err());
    }

    #[test]
    fn test_parse_listings_bad_entry_rejects_page() {
        let body = format!(r#"{{"data": [{}, {{"id": "x"}}]}}"#, LISTING_JSON);
        let err = parse_listings(&body).unwrap_err();
        assert!(err.contains("listing 1 of 2"), "unexpected error: {}", err);
    }

    #[test]
    fn test_parse_listings_wrong_field_type_everywhere() {
        // Price as a string on every item must not degrade into an empty page
        let body = r#"{"data": [
            {"id": "1", "price": "450.00", "type": "buy_now", "item": {"market_hash_name": "A"}},
            {"id": "2", "price": "12.00", "type": "buy_now", "item": {"market_hash_name": "B"}}
        ]}"#;
        assert!(parse_listings(body).is_err());
    }

    #[test]
    fn test_parse_listings_null_data_is_empty() {
        assert!(parse_listings(r#"{"data": null}"#).unwrap().is_empty());

        let fallback = format!(r#"{{"data": null, "listings": [{}]}}"#, LISTING_JSON);
        assert_eq!(parse_listings(&fallback).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_listings_without_reference() {
        let body = r#"{"data": [{
            "id": "1", "price": 1000, "type": "buy_now",
            "item": {"market_hash_name": "Sticker | Crown (Foil)"}
        }]}"#;
        let listings = parse_listings(body).unwrap();

        assert!(listings[0].reference.is_none());
        assert!(listings[0].item.float_value.is_none());
    }

    #[test]
    fn test_parse_remaining() {
        assert_eq!(parse_remaining(&headers(&[("x-ratelimit-remaining", "17")])), Some(17));
        assert_eq!(parse_remaining(&headers(&[("x-ratelimit-remaining", "3.0")])), Some(3));
        assert_eq!(parse_remaining(&headers(&[("x-ratelimit-remaining", "lots")])), None);
        assert_eq!(parse_remaining(&HeaderMap::new()), None);
    }

    #[test]
    fn test_parse_reset_delta_and_epoch() {
        let now = 1_700_000_000;
        assert_eq!(parse_reset(&headers(&[("x-ratelimit-reset", "30")]), now), Some(30));
        assert_eq!(
            parse_reset(&headers(&[("x-ratelimit-reset", "1700000045")]), now),
            Some(45)
        );
        // Epoch already in the past
        assert_eq!(
            parse_reset(&headers(&[("x-ratelimit-reset", "1699999990")]), now),
            Some(0)
        );
    }

    #[test]
    fn test_listings_url_trims_slash() {
        let client = CsfloatClient::with_config(CsfloatConfig {
            api_base_url: "http://localhost:8080/".to_string(),
            ..CsfloatConfig::default()
        })
        .unwrap();
        assert_eq!(client.listings_url(), "http://localhost:8080/api/v1/listings");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é...");
    }
}
