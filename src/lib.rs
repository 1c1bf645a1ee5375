//! Tech Daily - an RSS news aggregator
//!
//! Fetches a configured set of feeds concurrently, normalizes their items into
//! one article model and serves paginated listings, search and personalized
//! recommendations over a JSON API, with a TTL cache in front of the sources.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod normalizer;
pub mod query;
pub mod recommend;
pub mod routes;
pub mod service;
pub mod sources;
