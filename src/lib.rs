//! Time-bounded caching for asynchronously fetched configuration.
//!
//! This crate wraps an arbitrary asynchronous configuration source behind
//! [`ConfigCache`], which serves the last good value while it is fresh,
//! refreshes it on demand or in the background, and keeps serving stale
//! data when the source misbehaves.

pub mod cache;
pub mod error;
pub mod fetcher;

pub use cache::{CacheOptions, ConfigCache, FetchErrorHandler};
pub use error::CacheError;
pub use fetcher::{ConfigFetcher, FetchFn};
