//! Configuration source trait

use async_trait::async_trait;
use std::future::Future;

/// Asynchronous source of configuration values.
///
/// Implementations of this trait load a configuration snapshot from
/// wherever it lives (an HTTP endpoint, a file, a database row) and
/// convert it into the typed value handed out by the cache. The cache
/// never inspects the value; it only decides when to call `fetch` again.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    /// The configuration value this source produces.
    type Config: Clone + Send + Sync + 'static;

    /// Load a fresh configuration snapshot.
    async fn fetch(&self) -> anyhow::Result<Self::Config>;
}

/// Adapter that turns an async closure into a [`ConfigFetcher`], for
/// callers that have no dedicated source type.
pub struct FetchFn<F>(F);

impl<F> FetchFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<T, F, Fut> ConfigFetcher for FetchFn<F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send,
{
    type Config = T;

    async fn fetch(&self) -> anyhow::Result<T> {
        (self.0)().await
    }
}
