//! Proxy stack assembler (C8).
//!
//! Wraps a raw session-bound proxy in a fixed-order pipeline of optional and
//! mandatory adapters:
//!
//! ```text
//! P0 -> Recovering(P0)? -> Retrying(.)? -> BlockingAware(.) -> Delegating(.)
//! ```
//!
//! The order is load-bearing, not stylistic: `Retrying` must sit outside
//! `Recovering` so a session replacement's `OperationLost` is itself
//! retryable, and `BlockingAware` must sit outside both because only it
//! knows the caller's executor. See [`build`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::instrument;

use crate::error::AtomixError;
use crate::error::AtomixResult;
use crate::raft_participant::ReadConsistency;
use crate::session::SessionManager;
use crate::topology::PartitionId;
use crate::AppPayload;

/// A live handle bound to a session, executing commands and queries against
/// one partition.
#[async_trait]
pub trait PrimitiveProxy<D, R>: Send + Sync
where
    D: AppPayload,
    R: AppPayload,
{
    async fn execute(&self, command: D) -> AtomixResult<R>;
    async fn query(&self, level: ReadConsistency, query: D) -> AtomixResult<R>;
}

/// Replays a client-registered event listener after a transparent session
/// recovery.
pub type ListenerReplay = Box<dyn Fn() + Send + Sync>;

/// `P0`: a proxy bound directly to a partition's current session, via the
/// session manager.
pub struct RawSessionProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    sessions: Arc<SessionManager<D, R>>,
    partition: PartitionId,
}

impl<D, R> RawSessionProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    pub fn new(sessions: Arc<SessionManager<D, R>>, partition: PartitionId) -> Self {
        Self { sessions, partition }
    }
}

#[async_trait]
impl<D, R> PrimitiveProxy<D, R> for RawSessionProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    async fn execute(&self, command: D) -> AtomixResult<R> {
        self.sessions.submit(self.partition, command).await
    }

    async fn query(&self, level: ReadConsistency, query: D) -> AtomixResult<R> {
        self.sessions.query(self.partition, level, query).await
    }
}

/// Opt-in: on `SessionExpired`, transparently opens a fresh session (the
/// session manager does this lazily on next use), replays registered
/// listeners, and surfaces `OperationLost` for the operation that observed
/// the expiry — the caller, or a `Retrying` layer above, decides whether to
/// retry.
pub struct RecoveringProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    inner: RwLock<Arc<dyn PrimitiveProxy<D, R>>>,
    rebuild: Box<dyn Fn() -> Arc<dyn PrimitiveProxy<D, R>> + Send + Sync>,
    listeners: RwLock<Vec<ListenerReplay>>,
}

impl<D, R> RecoveringProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    pub fn new(initial: Arc<dyn PrimitiveProxy<D, R>>, rebuild: Box<dyn Fn() -> Arc<dyn PrimitiveProxy<D, R>> + Send + Sync>) -> Self {
        Self {
            inner: RwLock::new(initial),
            rebuild,
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener to be replayed against the fresh proxy after a
    /// transparent recovery.
    pub async fn register_listener(&self, listener: ListenerReplay) {
        self.listeners.write().await.push(listener);
    }

    async fn recover(&self) {
        let fresh = (self.rebuild)();
        *self.inner.write().await = fresh;
        for listener in self.listeners.read().await.iter() {
            listener();
        }
    }
}

#[async_trait]
impl<D, R> PrimitiveProxy<D, R> for RecoveringProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    #[instrument(skip(self, command))]
    async fn execute(&self, command: D) -> AtomixResult<R> {
        let result = self.inner.read().await.execute(command).await;
        match result {
            Err(ref e) if e.is_recoverable_session_error() => {
                self.recover().await;
                Err(AtomixError::OperationLost)
            }
            other => other,
        }
    }

    #[instrument(skip(self, query))]
    async fn query(&self, level: ReadConsistency, query: D) -> AtomixResult<R> {
        let result = self.inner.read().await.query(level, query).await;
        match result {
            Err(ref e) if e.is_recoverable_session_error() => {
                self.recover().await;
                Err(AtomixError::OperationLost)
            }
            other => other,
        }
    }
}

/// Opt-in: retries transient errors (`Unavailable`, `LeaderUnknown`,
/// `OperationLost`) up to `max_retries` times with a fixed delay.
/// Non-transient errors pass through unchanged.
pub struct RetryingProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    inner: Arc<dyn PrimitiveProxy<D, R>>,
    max_retries: usize,
    retry_delay: Duration,
}

impl<D, R> RetryingProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    pub fn new(inner: Arc<dyn PrimitiveProxy<D, R>>, max_retries: usize, retry_delay: Duration) -> Self {
        Self { inner, max_retries, retry_delay }
    }
}

#[async_trait]
impl<D, R> PrimitiveProxy<D, R> for RetryingProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    #[instrument(skip(self, command))]
    async fn execute(&self, command: D) -> AtomixResult<R> {
        let mut attempt = 0;
        loop {
            match self.inner.execute(command.clone()).await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, max_retries = self.max_retries, error = %e, "retrying after transient error");
                    sleep(self.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    #[instrument(skip(self, query))]
    async fn query(&self, level: ReadConsistency, query: D) -> AtomixResult<R> {
        let mut attempt = 0;
        loop {
            match self.inner.query(level, query.clone()).await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, max_retries = self.max_retries, error = %e, "retrying after transient error");
                    sleep(self.retry_delay).await;
                }
                other => return other,
            }
        }
    }
}

/// Reschedules the inner call onto a caller-supplied executor so a user
/// blocking on the returned future never deadlocks a session or transport
/// I/O task. Always applied, regardless of recovery/retry configuration.
pub struct BlockingAwareProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    inner: Arc<dyn PrimitiveProxy<D, R>>,
    executor: tokio::runtime::Handle,
}

impl<D, R> BlockingAwareProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    pub fn new(inner: Arc<dyn PrimitiveProxy<D, R>>, executor: tokio::runtime::Handle) -> Self {
        Self { inner, executor }
    }

    fn spawn_on_executor<Fut>(&self, fut: Fut) -> tokio::task::JoinHandle<AtomixResult<R>>
    where
        Fut: Future<Output = AtomixResult<R>> + Send + 'static,
    {
        self.executor.spawn(fut)
    }
}

#[async_trait]
impl<D, R> PrimitiveProxy<D, R> for BlockingAwareProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    #[instrument(skip(self, command))]
    async fn execute(&self, command: D) -> AtomixResult<R> {
        let inner = self.inner.clone();
        let fut: Pin<Box<dyn Future<Output = AtomixResult<R>> + Send>> = Box::pin(async move { inner.execute(command).await });
        self.spawn_on_executor(fut).await.map_err(|_| AtomixError::ShuttingDown)?
    }

    #[instrument(skip(self, query))]
    async fn query(&self, level: ReadConsistency, query: D) -> AtomixResult<R> {
        let inner = self.inner.clone();
        let fut: Pin<Box<dyn Future<Output = AtomixResult<R>> + Send>> = Box::pin(async move { inner.query(level, query).await });
        self.spawn_on_executor(fut).await.map_err(|_| AtomixError::ShuttingDown)?
    }
}

/// Always outermost: gives the caller a stable handle, independent of any
/// session replacement happening in the layers beneath it.
pub struct DelegatingProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    inner: Arc<dyn PrimitiveProxy<D, R>>,
}

impl<D, R> DelegatingProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    pub fn new(inner: Arc<dyn PrimitiveProxy<D, R>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D, R> PrimitiveProxy<D, R> for DelegatingProxy<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    #[instrument(skip(self, command))]
    async fn execute(&self, command: D) -> AtomixResult<R> {
        self.inner.execute(command).await
    }

    #[instrument(skip(self, query))]
    async fn query(&self, level: ReadConsistency, query: D) -> AtomixResult<R> {
        self.inner.query(level, query).await
    }
}

/// Recovery/retry configuration for one proxy stack assembly.
#[derive(Clone, Debug)]
pub struct ProxyStackConfig {
    pub recover_on_expiry: bool,
    pub max_retries: usize,
    pub retry_delay: Duration,
}

impl Default for ProxyStackConfig {
    fn default() -> Self {
        Self {
            recover_on_expiry: false,
            max_retries: 0,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Assemble the fixed-order proxy stack over a raw session proxy for
/// `partition`, per `config`.
pub fn build<D, R>(
    sessions: Arc<SessionManager<D, R>>,
    partition: PartitionId,
    config: &ProxyStackConfig,
    executor: tokio::runtime::Handle,
) -> Arc<DelegatingProxy<D, R>>
where
    D: AppPayload,
    R: AppPayload,
{
    let raw: Arc<dyn PrimitiveProxy<D, R>> = Arc::new(RawSessionProxy::new(sessions.clone(), partition));

    let recovered: Arc<dyn PrimitiveProxy<D, R>> = if config.recover_on_expiry {
        let sessions_for_rebuild = sessions.clone();
        Arc::new(RecoveringProxy::new(
            raw,
            Box::new(move || -> Arc<dyn PrimitiveProxy<D, R>> { Arc::new(RawSessionProxy::new(sessions_for_rebuild.clone(), partition)) }),
        ))
    } else {
        raw
    };

    let retried: Arc<dyn PrimitiveProxy<D, R>> = if config.max_retries > 0 {
        Arc::new(RetryingProxy::new(recovered, config.max_retries, config.retry_delay))
    } else {
        recovered
    };

    let blocking_aware: Arc<dyn PrimitiveProxy<D, R>> = Arc::new(BlockingAwareProxy::new(retried, executor));

    Arc::new(DelegatingProxy::new(blocking_aware))
}
