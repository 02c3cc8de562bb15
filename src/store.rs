use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use poem::{Request, Result};
use tokio::time::Instant;

use crate::{
    cleanup_task::CleanupTask, delegate::SessionAccess, MemoryStorage, SessionConfig,
    SessionDelegate, SessionStorage, SessionToken,
};

struct StoreInner<T, S> {
    config: SessionConfig,
    storage: S,
    delegate: RwLock<Option<Weak<dyn SessionDelegate<T>>>>,
}

/// A server-side session store keyed by session tokens.
///
/// Each token owns a bag of `T` values that expires when it has not been
/// written for [`SessionConfig::expiration`]. A background task started by
/// [`SessionStore::new`] evicts expired bags every
/// [`SessionConfig::sweep_interval`] until the last handle to the store is
/// dropped or [`SessionStore::shutdown`] is called.
///
/// Cloning the store is cheap, every clone shares the same storage.
///
/// # Example
///
/// ```
/// use poem::{
///     get, handler, test::TestClient, web::Data, EndpointExt, Request, Result, Route,
/// };
/// use poem_ttlsession::{SessionConfig, SessionStore, TokenSession};
///
/// #[handler]
/// async fn index(req: &Request, store: Data<&SessionStore<i32>>) -> Result<String> {
///     let count = store.get(req, "count").await?.unwrap_or_default() + 1;
///     store.set(req, "count", count).await?;
///     Ok(format!("count: {count}"))
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = SessionStore::<i32>::in_memory(SessionConfig::new());
/// let app = Route::new()
///     .at("/", get(index))
///     .with(TokenSession::new(store));
/// let cli = TestClient::new(app);
///
/// let resp = cli.get("/").send().await;
/// resp.assert_status_is_ok();
/// resp.assert_text("count: 1").await;
/// # });
/// ```
pub struct SessionStore<T, S = MemoryStorage<T>> {
    inner: Arc<StoreInner<T, S>>,
    cleanup: Arc<CleanupTask>,
}

impl<T, S> Clone for SessionStore<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cleanup: self.cleanup.clone(),
        }
    }
}

impl<T> SessionStore<T, MemoryStorage<T>>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a `SessionStore` backed by a new [`MemoryStorage`].
    pub fn in_memory(config: SessionConfig) -> Self {
        Self::new(config, MemoryStorage::new())
    }
}

impl<T, S> SessionStore<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: SessionStorage<T> + 'static,
{
    /// Create a `SessionStore` and start its expiration sweep.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(config: SessionConfig, storage: S) -> Self {
        let period = config.get_sweep_interval();
        let inner = Arc::new(StoreInner {
            config,
            storage,
            delegate: RwLock::new(None),
        });

        let cleanup = CleanupTask::new(period, {
            let inner = Arc::downgrade(&inner);
            move || {
                let inner = inner.upgrade();
                async move {
                    if let Some(inner) = inner {
                        if let Err(err) = inner.sweep().await {
                            tracing::error!(error = %err, "failed to sweep expired sessions");
                        }
                    }
                }
            }
        });

        Self {
            inner,
            cleanup: Arc::new(cleanup),
        }
    }

    /// Registers `delegate` and returns the store.
    #[must_use]
    pub fn with_delegate<D>(self, delegate: &Arc<D>) -> Self
    where
        D: SessionDelegate<T> + 'static,
    {
        self.set_delegate(delegate);
        self
    }

    /// Registers `delegate`, replacing any previous one.
    ///
    /// Only a weak reference is kept. The caller stays responsible for
    /// keeping the delegate alive, and once it is dropped every hook passes
    /// values through unchanged.
    pub fn set_delegate<D>(&self, delegate: &Arc<D>)
    where
        D: SessionDelegate<T> + 'static,
    {
        let delegate = Arc::downgrade(delegate) as Weak<dyn SessionDelegate<T>>;
        *self.inner.delegate.write() = Some(delegate);
    }

    /// Unregisters the delegate.
    pub fn remove_delegate(&self) {
        self.inner.delegate.write().take();
    }

    /// Returns the configuration of this store.
    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Returns the storage of this store.
    #[inline]
    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    /// Returns the session token attached to `req`.
    ///
    /// # Panics
    ///
    /// Panics if the request has not passed through the
    /// [`TokenSession`](crate::TokenSession) middleware.
    pub fn token<'a>(&self, req: &'a Request) -> &'a SessionToken {
        req.data::<SessionToken>().expect(
            "No session token present in request, the `TokenSession` middleware is required.",
        )
    }

    /// Makes sure `req` carries a session token, issuing a new one if the
    /// request has no valid token cookie.
    ///
    /// A new token is added to the request's cookie jar, which sends it to
    /// the client, and attached to the request so reads and writes later in
    /// the same request find it.
    ///
    /// # Panics
    ///
    /// Panics if the `CookieJarManager` middleware is not installed.
    pub fn ensure_token(&self, req: &mut Request) -> Result<SessionToken> {
        if let Some(token) = req.data::<SessionToken>() {
            return Ok(token.clone());
        }

        let cookie_jar = req.cookie().clone();
        let token = match self.inner.config.get_cookie_value(&cookie_jar) {
            Some(token) => token,
            None => {
                let token = SessionToken::generate()?;
                self.inner.config.set_cookie_value(&cookie_jar, &token);
                tracing::debug!("issued session token");
                token
            }
        };

        req.set_data(token.clone());
        Ok(token)
    }

    /// Get a value from the session of `req`.
    ///
    /// # Panics
    ///
    /// Panics if the request carries no session token.
    pub async fn get(&self, req: &Request, key: &str) -> Result<Option<T>> {
        let access = SessionAccess {
            token: self.token(req),
            key,
            request: Some(req),
        };
        self.inner.read(access).await
    }

    /// Sets a key-value pair into the session of `req`.
    ///
    /// # Panics
    ///
    /// Panics if the request carries no session token.
    pub async fn set(&self, req: &Request, key: &str, value: T) -> Result<()> {
        let access = SessionAccess {
            token: self.token(req),
            key,
            request: Some(req),
        };
        self.inner.write(access, Some(value)).await
    }

    /// Remove a value from the session of `req`.
    ///
    /// # Panics
    ///
    /// Panics if the request carries no session token.
    pub async fn remove(&self, req: &Request, key: &str) -> Result<()> {
        let access = SessionAccess {
            token: self.token(req),
            key,
            request: Some(req),
        };
        self.inner.write(access, None).await
    }

    /// Get a value from the session identified by `token`.
    pub async fn get_by_token(&self, token: &SessionToken, key: &str) -> Result<Option<T>> {
        let access = SessionAccess {
            token,
            key,
            request: None,
        };
        self.inner.read(access).await
    }

    /// Sets a key-value pair into the session identified by `token`.
    pub async fn set_by_token(&self, token: &SessionToken, key: &str, value: T) -> Result<()> {
        let access = SessionAccess {
            token,
            key,
            request: None,
        };
        self.inner.write(access, Some(value)).await
    }

    /// Remove a value from the session identified by `token`.
    pub async fn remove_by_token(&self, token: &SessionToken, key: &str) -> Result<()> {
        let access = SessionAccess {
            token,
            key,
            request: None,
        };
        self.inner.write(access, None).await
    }

    /// Evicts every expired session now, returning how many were removed.
    pub async fn sweep(&self) -> Result<usize> {
        self.inner.sweep().await
    }

    /// Stops the background sweep of this store and all of its clones.
    ///
    /// Reads and writes keep working, but expired sessions are only evicted
    /// by explicit calls to [`SessionStore::sweep`].
    pub fn shutdown(&self) {
        self.cleanup.cancel();
    }
}

impl<T, S> StoreInner<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: SessionStorage<T>,
{
    fn delegate(&self) -> Option<Arc<dyn SessionDelegate<T>>> {
        self.delegate.read().as_ref().and_then(Weak::upgrade)
    }

    async fn read(&self, access: SessionAccess<'_>) -> Result<Option<T>> {
        let value = self
            .storage
            .load_entry(access.token, access.key, Instant::now())
            .await?;

        let Some(delegate) = self.delegate() else {
            return Ok(value);
        };

        if !delegate.should_return(access, value.as_ref()) {
            return Ok(None);
        }

        let value = delegate.will_return(access, value.as_ref()).or(value);
        delegate.did_return(access, value.as_ref());
        Ok(value)
    }

    async fn write(&self, access: SessionAccess<'_>, value: Option<T>) -> Result<()> {
        let delegate = self.delegate();
        let value = match &delegate {
            Some(delegate) => delegate.will_store(access, value),
            None => value,
        };
        let expired = self
            .storage
            .update_entry(access.token, access.key, value, self.config.ttl())
            .await?;

        if let Some(container) = expired {
            tracing::debug!("expired session replaced by a write");
            if let Some(delegate) = &delegate {
                delegate.deleted(access.token, container.value());
            }
        }
        Ok(())
    }

    async fn sweep(&self) -> Result<usize> {
        let now = Instant::now();
        let expired = self.storage.expired_tokens(now).await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let delegate = self.delegate();
        let mut evicted = 0;
        for token in expired {
            match self.storage.remove_expired(&token, now).await {
                Ok(Some(container)) => {
                    evicted += 1;
                    if let Some(delegate) = &delegate {
                        delegate.deleted(&token, container.value());
                    }
                }
                Ok(None) => tracing::trace!("session rewritten before eviction, skipped"),
                Err(err) => {
                    tracing::error!(error = %err, "failed to evict expired session");
                }
            }
        }

        tracing::debug!(evicted, "swept expired sessions");
        Ok(evicted)
    }
}
