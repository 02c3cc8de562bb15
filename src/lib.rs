//! Token-keyed server-side session store with TTL expiry for Poem.
//!
//! Every client gets an opaque random token in a cookie. The token keys a
//! bag of values kept on the server, which expires when it has not been
//! written for the configured TTL. A background task evicts expired bags
//! periodically.
//!
//! - [`TokenSession`] makes sure every request carries a token.
//! - [`SessionStore`] reads and writes values for the token of a request.
//! - [`SessionStorage`] is the back-end interface, [`MemoryStorage`] keeps
//!   everything in memory.
//! - [`SessionDelegate`] hooks into reads, writes and evictions.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use poem::{
//!     get, handler, listener::TcpListener, web::Data, EndpointExt, Request, Result, Route,
//!     Server,
//! };
//! use poem_ttlsession::{
//!     SessionAccess, SessionConfig, SessionDelegate, SessionStore, TokenSession,
//! };
//!
//! struct Audit;
//!
//! impl SessionDelegate<String> for Audit {
//!     fn did_return(&self, access: SessionAccess<'_>, value: Option<&String>) {
//!         tracing::info!(key = access.key(), found = value.is_some(), "session read");
//!     }
//! }
//!
//! #[handler]
//! async fn index(req: &Request, store: Data<&SessionStore<String>>) -> Result<String> {
//!     let name = store.get(req, "name").await?;
//!     store.set(req, "name", "poem".to_string()).await?;
//!     Ok(format!("hello: {name:?}"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), std::io::Error> {
//!     let audit = Arc::new(Audit);
//!     let store = SessionStore::<String>::in_memory(SessionConfig::new()).with_delegate(&audit);
//!     let app = Route::new().at("/", get(index)).with(TokenSession::new(store));
//!     Server::new(TcpListener::bind("0.0.0.0:3000"))
//!         .run(app)
//!         .await
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

mod cleanup_task;
mod config;
mod delegate;
mod error;
mod expiring;
mod memory_storage;
mod middleware;
mod session_storage;
mod store;
#[cfg(test)]
mod test_harness;
mod token;

pub use config::{CookieSecurity, SessionConfig};
pub use delegate::{SessionAccess, SessionDelegate};
pub use error::SessionError;
pub use expiring::Expiring;
pub use memory_storage::MemoryStorage;
pub use middleware::{TokenSession, TokenSessionEndpoint};
pub use session_storage::{Entries, SessionStorage};
pub use store::SessionStore;
pub use token::{SessionToken, TOKEN_BYTES};
