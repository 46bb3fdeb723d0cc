//! CSFloat Adapter
//!
//! Implementation of the ListingSource port for the CSFloat marketplace.

mod client;

pub use client::{
    parse_listings, parse_remaining, parse_reset, CsfloatClient, CsfloatConfig,
    DEFAULT_API_BASE_URL, DEFAULT_USER_AGENT, LISTINGS_PATH,
};
