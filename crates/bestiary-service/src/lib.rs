//! The bestiary data-access layer.
//!
//! This crate sits between a UI and a remote, read-only REST catalog and makes
//! repeated, overlapping reads cheap: results are held in bounded in-memory
//! caches, concurrent requests for the same logical key are coalesced into a
//! single network round-trip, batch fetches run under a fixed concurrency
//! ceiling, and free-text search is debounced and resolved cache-first.
//!
//! The entry point is [`CatalogService`](services::CatalogService), an
//! explicitly constructed context object that owns all shared state. There are
//! no process-wide singletons.

pub mod batch;
pub mod caching;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod search;
pub mod services;
pub mod types;

pub use caching::{CacheContents, CacheError, CacheKey};
pub use config::Config;
pub use search::SearchSession;
pub use services::CatalogService;
pub use types::{CacheStats, CatalogEntry, CatalogSummary, IndexReference};
