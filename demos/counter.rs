use std::{sync::Arc, time::Duration};

use poem::{
    get, handler, listener::TcpListener, middleware::Tracing, web::Data, EndpointExt, Request,
    Result, Route, Server,
};
use poem_ttlsession::{
    Entries, SessionAccess, SessionConfig, SessionDelegate, SessionStore, SessionToken,
    TokenSession,
};

struct Audit;

impl SessionDelegate<u64> for Audit {
    fn will_store(&self, access: SessionAccess<'_>, value: Option<u64>) -> Option<u64> {
        tracing::info!(key = access.key(), value = ?value, "session write");
        value
    }

    fn deleted(&self, _token: &SessionToken, entries: &Entries<u64>) {
        tracing::info!(entries = entries.len(), "session expired");
    }
}

#[handler]
async fn index(req: &Request, store: Data<&SessionStore<u64>>) -> Result<String> {
    let count = store.get(req, "count").await?.unwrap_or_default() + 1;
    store.set(req, "count", count).await?;
    Ok(format!("you have visited {count} times"))
}

#[handler]
async fn reset(req: &Request, store: Data<&SessionStore<u64>>) -> Result<&'static str> {
    store.remove(req, "count").await?;
    Ok("counter reset")
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "poem=debug,poem_ttlsession=debug,counter=info");
    }
    tracing_subscriber::fmt::init();

    let audit = Arc::new(Audit);
    let store = SessionStore::<u64>::in_memory(
        SessionConfig::new()
            .expiration(Duration::from_secs(30))
            .sweep_interval(Duration::from_secs(5)),
    )
    .with_delegate(&audit);

    let app = Route::new()
        .at("/", get(index))
        .at("/reset", get(reset))
        .with(TokenSession::new(store))
        .with(Tracing);
    Server::new(TcpListener::bind("0.0.0.0:3000"))
        .name("counter")
        .run(app)
        .await
}
