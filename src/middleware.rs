use poem::{
    middleware::{CookieJarManager, CookieJarManagerEndpoint},
    Endpoint, FromRequest, Middleware, Request, RequestBody, Result,
};

use crate::{MemoryStorage, SessionError, SessionStorage, SessionStore, SessionToken};

/// Middleware that attaches a session token to every request.
///
/// Requests without a valid token cookie get a freshly issued token, which
/// is sent back in the response cookie and is visible to the rest of the
/// same request. The store itself is added to the request data, so handlers
/// can extract it with `Data<&SessionStore<T, S>>`.
///
/// Any well-formed token a client presents is accepted, whether or not this
/// server issued it. Use [`SessionConfig::signed`](crate::SessionConfig::signed)
/// or [`SessionConfig::private`](crate::SessionConfig::private) to only
/// accept tokens minted with the server's key, and
/// [`SessionConfig::secure`](crate::SessionConfig::secure) when serving over
/// HTTPS.
pub struct TokenSession<T, S = MemoryStorage<T>> {
    store: SessionStore<T, S>,
}

impl<T, S> TokenSession<T, S> {
    /// Create a `TokenSession` middleware.
    pub fn new(store: SessionStore<T, S>) -> Self {
        Self { store }
    }
}

impl<T, S, E> Middleware<E> for TokenSession<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: SessionStorage<T> + 'static,
    E: Endpoint,
{
    type Output = CookieJarManagerEndpoint<TokenSessionEndpoint<T, S, E>>;

    fn transform(&self, ep: E) -> Self::Output {
        CookieJarManager::new().transform(TokenSessionEndpoint {
            inner: ep,
            store: self.store.clone(),
        })
    }
}

/// Endpoint for `TokenSession` middleware.
pub struct TokenSessionEndpoint<T, S, E> {
    inner: E,
    store: SessionStore<T, S>,
}

impl<T, S, E> Endpoint for TokenSessionEndpoint<T, S, E>
where
    T: Clone + Send + Sync + 'static,
    S: SessionStorage<T> + 'static,
    E: Endpoint,
{
    type Output = E::Output;

    async fn call(&self, mut req: Request) -> Result<Self::Output> {
        self.store.ensure_token(&mut req)?;
        req.set_data(self.store.clone());
        self.inner.call(req).await
    }
}

impl<'a> FromRequest<'a> for SessionToken {
    async fn from_request(req: &'a Request, _body: &mut RequestBody) -> Result<Self> {
        match req.data::<SessionToken>() {
            Some(token) => Ok(token.clone()),
            None => {
                tracing::error!(
                    "`TokenSession` middleware is not active, while trying to extract `SessionToken`!"
                );
                Err(SessionError::MissingToken.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use poem::{
        get, handler,
        http::{header, StatusCode},
        test::TestClient as PoemClient,
        web::{cookie::Cookie, Data},
        EndpointExt, Route,
    };

    use super::*;
    use crate::{test_harness::TestClient, SessionConfig};

    #[handler]
    async fn counter(req: &Request, store: Data<&SessionStore<i32>>) -> Result<String> {
        let count = store.get(req, "count").await?.unwrap_or_default() + 1;
        store.set(req, "count", count).await?;
        Ok(count.to_string())
    }

    #[handler]
    fn show_token(token: SessionToken) -> String {
        token.to_string()
    }

    fn app(config: SessionConfig) -> impl Endpoint {
        let store = SessionStore::<i32>::in_memory(config);
        Route::new()
            .at("/", get(counter))
            .at("/token", get(show_token))
            .with(TokenSession::new(store))
    }

    #[tokio::test]
    async fn issues_cookie_on_first_request() {
        let cli = PoemClient::new(app(SessionConfig::new()));
        let resp = cli.get("/").send().await;
        resp.assert_status_is_ok();

        let set_cookie = resp
            .0
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        let cookie = Cookie::parse(set_cookie).unwrap();
        assert_eq!(cookie.name(), "perfect-session");
        assert!(SessionToken::parse(cookie.value_str()).is_some());
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.http_only());
        assert!(!cookie.secure());
        assert_eq!(
            cookie.max_age(),
            Some(Duration::from_secs(365 * 24 * 60 * 60))
        );

        // the write in the first request already used the new token
        resp.assert_text("1").await;
    }

    #[tokio::test]
    async fn token_is_reused() {
        let app = app(SessionConfig::new());
        let mut client = TestClient::default();

        assert_eq!(client.call(&app, "/").await, "1");
        let cookies = client.cookies();
        assert_eq!(cookies.len(), 1);

        assert_eq!(client.call(&app, "/").await, "2");
        assert_eq!(client.call(&app, "/").await, "3");
        assert_eq!(client.cookies(), cookies);
        assert_eq!(client.set_cookie_count(), 1);

        let token = client.call(&app, "/token").await;
        assert_eq!(Some(&token), cookies.get("perfect-session"));
    }

    #[tokio::test]
    async fn clients_are_isolated() {
        let app = app(SessionConfig::new().cookie_name("sid"));
        let mut alice = TestClient::default();
        let mut bob = TestClient::default();

        assert_eq!(alice.call(&app, "/").await, "1");
        assert_eq!(alice.call(&app, "/").await, "2");
        assert_eq!(bob.call(&app, "/").await, "1");
        assert_ne!(alice.cookies().get("sid"), bob.cookies().get("sid"));
    }

    #[tokio::test]
    async fn forged_cookie_is_replaced() {
        let app = app(SessionConfig::new());
        let mut client = TestClient::default();
        client.set_cookie("perfect-session", "forged");

        assert_eq!(client.call(&app, "/").await, "1");
        let token = client.cookies().get("perfect-session").cloned().unwrap();
        assert_ne!(token, "forged");
        assert!(SessionToken::parse(&token).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_keeps_token() {
        let store = SessionStore::<i32>::in_memory(
            SessionConfig::new()
                .expiration(Duration::from_secs(2))
                .sweep_interval(Duration::from_secs(3600)),
        );
        let app = Route::new()
            .at("/", get(counter))
            .with(TokenSession::new(store.clone()));
        let mut client = TestClient::default();

        assert_eq!(client.call(&app, "/").await, "1");
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.sweep().await.unwrap(), 1);

        assert_eq!(client.call(&app, "/").await, "1");
        assert_eq!(client.set_cookie_count(), 1);
    }

    #[tokio::test]
    async fn token_extractor_requires_middleware() {
        let cli = PoemClient::new(Route::new().at("/token", get(show_token)));
        let resp = cli.get("/token").send().await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
