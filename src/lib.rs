//! csfloat-sniper - CSFloat Listing Monitor Library
//!
//! Polls the most recent marketplace listings, deduplicates them across
//! restarts and sends one push notification per listing priced at a
//! meaningful discount below its reference value.
//!
//! # Modules
//!
//! - `domain`: Core logic (Listing, DealDetector, RateController, LocalIdWindow)
//! - `ports`: Trait abstractions (ListingSource, SeenStore, Notifier)
//! - `adapters`: External implementations (CSFloat, SQLite, ntfy, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Dedup store and the monitor orchestrator

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
