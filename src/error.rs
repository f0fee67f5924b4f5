//! Cache error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// No value has ever been fetched successfully and the latest attempt
    /// failed as well. Carries the error from that attempt.
    #[error("Config could not be loaded: {0}")]
    Unavailable(anyhow::Error),
}
