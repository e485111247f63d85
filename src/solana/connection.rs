use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::cache::{Clock, TtlCache};
use crate::error::{RpcError, UpstreamErrorKind};
use crate::solana::client::LedgerRpc;

/// What a connection is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    #[default]
    Default,
    /// Token-account enumeration, which some providers serve poorly
    Token,
}

/// Retry schedule applied by [`ConnectionManager::make_request`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per endpoint
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// `base_delay * 2^attempt`, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Configuration for the connection manager
#[derive(Debug, Clone)]
pub struct ConnectionManagerConfig {
    /// Failures after which an endpoint is skipped
    pub failure_threshold: u32,
    /// How long a cached response is served as fresh
    pub cache_ttl: Duration,
    /// Idle time after which all failure counters are cleared
    pub reset_window: Duration,
    pub retry: RetryPolicy,
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cache_ttl: Duration::from_secs(20),
            reset_window: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// An RPC endpoint and its routing flags
pub struct Endpoint {
    pub client: Arc<dyn LedgerRpc>,
    /// Tried first for token-account enumeration
    pub token_preferred: bool,
    /// Never used for token-account enumeration
    pub token_unreliable: bool,
}

impl Endpoint {
    pub fn new(client: Arc<dyn LedgerRpc>) -> Self {
        Self { client, token_preferred: false, token_unreliable: false }
    }

    pub fn preferred_for_tokens(mut self) -> Self {
        self.token_preferred = true;
        self
    }

    pub fn unreliable_for_tokens(mut self) -> Self {
        self.token_unreliable = true;
        self
    }
}

/// Failure bookkeeping for one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointHealth {
    pub failure_count: u32,
    pub last_reset_at: Instant,
}

/// A handle on the endpoint chosen for one call
#[derive(Clone)]
pub struct Connection {
    pub index: usize,
    pub client: Arc<dyn LedgerRpc>,
}

impl Connection {
    pub fn url(&self) -> &str {
        self.client.url()
    }
}

struct PoolState {
    health: Vec<EndpointHealth>,
    cursor: usize,
    last_request_at: Option<Instant>,
}

impl PoolState {
    fn reset(&mut self, now: Instant) {
        for health in &mut self.health {
            health.failure_count = 0;
            health.last_reset_at = now;
        }
    }
}

type CachedValue = Arc<dyn Any + Send + Sync>;

/// Pool of RPC endpoints with failure-aware selection, retries and a short
/// response cache
pub struct ConnectionManager {
    endpoints: Vec<Endpoint>,
    state: Mutex<PoolState>,
    cache: Mutex<TtlCache<String, CachedValue>>,
    clock: Arc<dyn Clock>,
    config: ConnectionManagerConfig,
}

impl ConnectionManager {
    /// Create a new connection manager over the given endpoints
    pub fn new(endpoints: Vec<Endpoint>, config: ConnectionManagerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(anyhow!("At least one RPC endpoint is required"));
        }

        let now = clock.now();
        let health = vec![EndpointHealth { failure_count: 0, last_reset_at: now }; endpoints.len()];
        for endpoint in &endpoints {
            info!("Registered Solana RPC endpoint {}", endpoint.client.url());
        }

        Ok(Self {
            endpoints,
            state: Mutex::new(PoolState { health, cursor: 0, last_request_at: None }),
            cache: Mutex::new(TtlCache::new(config.cache_ttl)),
            clock,
            config,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connection(&self, index: usize) -> Connection {
        Connection { index, client: self.endpoints[index].client.clone() }
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn endpoint_health(&self) -> Vec<EndpointHealth> {
        self.lock_state().health.clone()
    }

    /// Pick an endpoint for the next call.
    ///
    /// Token requests go to the preferred token endpoint while it is healthy;
    /// everything else round-robins over endpoints below the failure threshold.
    /// When every endpoint is over the threshold the counters are cleared and
    /// the first endpoint is returned.
    pub fn get_connection(&self, kind: RequestKind) -> Connection {
        let now = self.clock.now();
        let threshold = self.config.failure_threshold;
        let mut state = self.lock_state();

        if let Some(last) = state.last_request_at {
            if now.saturating_duration_since(last) >= self.config.reset_window {
                info!("No RPC traffic for {:?}, clearing endpoint failure counters", self.config.reset_window);
                state.reset(now);
            }
        }
        state.last_request_at = Some(now);

        if kind == RequestKind::Token {
            if let Some(index) = self.endpoints.iter().position(|e| e.token_preferred) {
                if state.health[index].failure_count < threshold {
                    debug!("Using preferred token endpoint {}", self.endpoints[index].client.url());
                    return self.connection(index);
                }
            }
        }

        let count = self.endpoints.len();
        for offset in 0..count {
            let index = (state.cursor + offset) % count;
            if state.health[index].failure_count >= threshold {
                continue;
            }
            if kind == RequestKind::Token && self.endpoints[index].token_unreliable {
                continue;
            }
            state.cursor = (index + 1) % count;
            debug!("Using Solana RPC endpoint {}", self.endpoints[index].client.url());
            return self.connection(index);
        }

        warn!("All RPC endpoints exhausted, clearing failure counters");
        state.reset(now);
        state.cursor = 1 % count;
        self.connection(0)
    }

    pub fn record_failure(&self, index: usize) {
        let mut state = self.lock_state();
        if let Some(health) = state.health.get_mut(index) {
            health.failure_count = health.failure_count.saturating_add(1);
            if health.failure_count == self.config.failure_threshold {
                warn!("RPC endpoint {} reached failure threshold", self.endpoints[index].client.url());
            }
        }
    }

    pub fn record_success(&self, index: usize) {
        let mut state = self.lock_state();
        if let Some(health) = state.health.get_mut(index) {
            health.failure_count = health.failure_count.saturating_sub(1);
        }
    }

    fn cached<T: Clone + 'static>(&self, key: &str, fresh_only: bool) -> Option<T> {
        let now = self.clock.now();
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let value = if fresh_only { cache.get_fresh(key, now) } else { cache.get_stale(key) }?;
        value.downcast_ref::<T>().cloned()
    }

    fn store<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        let now = self.clock.now();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(key.to_string(), Arc::new(value), now);
    }

    pub fn invalidate(&self, key: &str) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).invalidate(key);
    }

    /// Run `request` with the default retry policy. See [`Self::make_request_with_attempts`].
    pub async fn make_request<T, F, Fut>(&self, kind: RequestKind, cache_key: Option<&str>, request: F) -> Result<T, RpcError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Arc<dyn LedgerRpc>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, RpcError>> + Send,
    {
        self.make_request_with_attempts(kind, cache_key, self.config.retry.max_attempts, request)
            .await
    }

    /// Run `request` against successive endpoints.
    ///
    /// A fresh cache entry short-circuits the call. Up to
    /// `max_attempts * endpoint_count` tries are made; rate-limited failures
    /// move on to the next endpoint immediately, other failures back off
    /// first. When every try fails a stale cache entry is returned if one
    /// exists, otherwise the last error.
    pub async fn make_request_with_attempts<T, F, Fut>(
        &self,
        kind: RequestKind,
        cache_key: Option<&str>,
        max_attempts: u32,
        request: F,
    ) -> Result<T, RpcError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Arc<dyn LedgerRpc>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, RpcError>> + Send,
    {
        if let Some(key) = cache_key {
            if let Some(value) = self.cached::<T>(key, true) {
                debug!("Serving {} from RPC cache", key);
                return Ok(value);
            }
        }

        let total = max_attempts.max(1) as usize * self.endpoints.len();
        let mut last_error: Option<RpcError> = None;

        for attempt in 0..total {
            let connection = self.get_connection(kind);
            match request(connection.client.clone()).await {
                Ok(value) => {
                    self.record_success(connection.index);
                    if let Some(key) = cache_key {
                        self.store(key, value.clone());
                    }
                    return Ok(value);
                }
                Err(err) => {
                    self.record_failure(connection.index);
                    warn!(
                        "RPC request to {} failed (attempt {}/{}): {}",
                        connection.url(),
                        attempt + 1,
                        total,
                        err
                    );
                    let rate_limited = err.kind == UpstreamErrorKind::RateLimited;
                    last_error = Some(err);
                    if !rate_limited && attempt + 1 < total {
                        tokio::time::sleep(self.config.retry.delay_for(attempt as u32)).await;
                    }
                }
            }
        }

        if let Some(key) = cache_key {
            if let Some(value) = self.cached::<T>(key, false) {
                warn!("All RPC attempts failed, serving stale cache entry for {}", key);
                return Ok(value);
            }
        }

        Err(last_error.unwrap_or_else(|| RpcError::new(UpstreamErrorKind::Other, "No RPC endpoint could be tried")))
    }
}
