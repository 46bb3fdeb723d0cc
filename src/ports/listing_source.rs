use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Listing;

/// Default remaining budget assumed when the server omits the header
pub const DEFAULT_RATE_REMAINING: u32 = 50;

/// Default reset window assumed on a 429 without a reset header
pub const DEFAULT_RATE_RESET_SECS: u64 = 30;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Rate limited by server (reset in {reset_secs}s)")]
    RateLimited {
        reset_secs: u64,
        remaining: Option<u32>,
    },

    #[error("API returned status {status}: {body}")]
    Status {
        status: u16,
        body: String,
        remaining: Option<u32>,
    },

    #[error("Malformed listings payload: {reason}")]
    Malformed {
        reason: String,
        remaining: Option<u32>,
    },

    #[error("Network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Remaining request budget reported alongside the failure, if any
    pub fn remaining(&self) -> Option<u32> {
        match self {
            FetchError::RateLimited { remaining, .. }
            | FetchError::Status { remaining, .. }
            | FetchError::Malformed { remaining, .. } => *remaining,
            FetchError::Network(_) => None,
        }
    }
}

/// Query for one page of listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub sort_by: String,
    pub limit: u32,
    pub listing_type: String,
    /// Minimum price in cents
    pub min_price: u64,
}

impl PageRequest {
    pub fn most_recent(limit: u32, min_price: u64) -> Self {
        Self {
            sort_by: "most_recent".to_string(),
            limit,
            listing_type: "buy_now".to_string(),
            min_price,
        }
    }
}

/// Out-of-band rate limit metadata from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub status: u16,
    pub reset_secs: u64,
}

impl Default for RateLimitInfo {
    fn default() -> Self {
        Self {
            remaining: DEFAULT_RATE_REMAINING,
            status: 200,
            reset_secs: 0,
        }
    }
}

/// One successfully fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub listings: Vec<Listing>,
    pub rate: RateLimitInfo,
}

/// Supplies bounded pages of the most recent listings
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    /// Fetch one page. Failures never panic; they come back as `FetchError`.
    async fn fetch_page(&self, request: &PageRequest) -> Result<ListingPage, FetchError>;
}
