//! Time-bounded configuration cache

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::fetcher::ConfigFetcher;

/// Observer invoked exactly once for every failed fetch attempt.
pub type FetchErrorHandler = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

/// Tuning options for a [`ConfigCache`].
#[derive(Clone, Default)]
pub struct CacheOptions {
    /// Schedule a background refresh after every successful fetch.
    pub auto_refresh: bool,
    /// Observer notified of failed fetch attempts. Failures are otherwise
    /// invisible to callers as long as a previous fetch has succeeded.
    pub on_fetch_error: Option<FetchErrorHandler>,
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("auto_refresh", &self.auto_refresh)
            .finish_non_exhaustive()
    }
}

/// Mutable cache state, guarded by the instance mutex.
struct CacheState<T> {
    /// Last successfully fetched value. Only ever overwritten by another
    /// successful fetch.
    value: Option<T>,
    /// Moment after which `value` is considered stale. Pushed forward after
    /// every settled fetch attempt, success or failure.
    expires_at: Instant,
    /// Pending auto-refresh task, at most one.
    timer: Option<JoinHandle<()>>,
}

impl<T> Drop for CacheState<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Shared<T> {
    fetcher: Arc<dyn ConfigFetcher<Config = T>>,
    interval: Duration,
    auto_refresh: bool,
    on_fetch_error: Option<FetchErrorHandler>,
    state: Mutex<CacheState<T>>,
}

/// Time-bounded cache around an asynchronous configuration source.
///
/// The cache holds the last value the source returned and serves it until
/// `interval` has elapsed, then refreshes on the next access. A failed
/// refresh never discards the previous value: callers keep receiving the
/// stale value and the failure is reported through the
/// [`on_fetch_error`](CacheOptions::on_fetch_error) observer. The only
/// hard failure is a cache that has never seen a successful fetch.
///
/// Handles are cheap to clone and share one underlying cache. Accesses
/// serialize on an internal mutex held across the fetch, so concurrent
/// callers never trigger overlapping refreshes.
pub struct ConfigCache<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ConfigCache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for ConfigCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigCache")
            .field("interval", &self.shared.interval)
            .field("auto_refresh", &self.shared.auto_refresh)
            .finish_non_exhaustive()
    }
}

impl<T> ConfigCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cache with default options (no auto-refresh, no error
    /// observer).
    pub fn new(fetcher: Arc<dyn ConfigFetcher<Config = T>>, interval: Duration) -> Self {
        Self::with_options(fetcher, interval, CacheOptions::default())
    }

    /// Create a cache with explicit options.
    ///
    /// The cache starts expired, so the first [`get`](Self::get) always
    /// consults the source.
    pub fn with_options(
        fetcher: Arc<dyn ConfigFetcher<Config = T>>,
        interval: Duration,
        options: CacheOptions,
    ) -> Self {
        info!(
            "Initializing config cache (interval: {:?}, auto_refresh: {})",
            interval, options.auto_refresh
        );

        Self {
            shared: Arc::new(Shared {
                fetcher,
                interval,
                auto_refresh: options.auto_refresh,
                on_fetch_error: options.on_fetch_error,
                state: Mutex::new(CacheState {
                    value: None,
                    expires_at: Instant::now(),
                    timer: None,
                }),
            }),
        }
    }

    /// Minimum time a fetched value is considered fresh.
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Whether a background refresh is scheduled after successful fetches.
    pub fn auto_refresh(&self) -> bool {
        self.shared.auto_refresh
    }

    /// Current cached value, if any, without consulting the source.
    pub async fn cached(&self) -> Option<T> {
        self.shared.state.lock().await.value.clone()
    }

    /// Return the cached value, refreshing it first if it is missing or
    /// expired.
    ///
    /// Fails with [`CacheError::Unavailable`] only when no fetch has ever
    /// succeeded.
    pub async fn get(&self) -> Result<T, CacheError> {
        self.get_inner(false).await
    }

    /// Refresh unconditionally, then return the value.
    ///
    /// Forcing only affects the decision to consult the source: a failed
    /// forced refresh still falls back to the previous value.
    pub async fn refresh(&self) -> Result<T, CacheError> {
        self.get_inner(true).await
    }

    async fn get_inner(&self, force: bool) -> Result<T, CacheError> {
        let mut state = self.shared.state.lock().await;

        match state.value.clone() {
            Some(value) if !force && Instant::now() < state.expires_at => Ok(value),
            cached => match self.refresh_locked(&mut state).await {
                Ok(fresh) => Ok(fresh),
                Err(err) => match cached {
                    Some(stale) => Ok(stale),
                    None => Err(CacheError::Unavailable(err)),
                },
            },
        }
    }

    /// Consult the source once and record the outcome. The caller holds the
    /// state lock.
    async fn refresh_locked(&self, state: &mut CacheState<T>) -> anyhow::Result<T> {
        let result = self.shared.fetcher.fetch().await;

        // Push the expiry forward whether or not the attempt succeeded, so a
        // failing source is retried at most once per interval.
        state.expires_at = Instant::now() + self.shared.interval;

        match result {
            Ok(value) => {
                debug!("Configuration refreshed");
                state.value = Some(value.clone());
                if self.shared.auto_refresh {
                    self.arm_timer(state);
                }
                Ok(value)
            }
            Err(err) => {
                warn!("Configuration fetch failed: {:#}", err);
                if let Some(handler) = &self.shared.on_fetch_error {
                    handler(&err);
                }
                Err(err)
            }
        }
    }

    /// Schedule a forced refresh once `interval` elapses, canceling any
    /// previously pending one so at most one timer is armed.
    ///
    /// The task holds only a weak reference: dropping the last cache handle
    /// lets the state drop, which aborts the pending timer.
    fn arm_timer(&self, state: &mut CacheState<T>) {
        if let Some(previous) = state.timer.take() {
            previous.abort();
        }

        let weak = Arc::downgrade(&self.shared);
        let interval = self.shared.interval;

        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;

            if let Some(shared) = weak.upgrade() {
                debug!("Running scheduled configuration refresh");
                let cache = ConfigCache { shared };
                if let Err(err) = cache.refresh().await {
                    warn!("Error during scheduled refresh: {}", err);
                }
            }
        }));
    }
}
