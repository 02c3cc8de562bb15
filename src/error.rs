use poem::{error::ResponseError, http::StatusCode};

/// Errors raised by the session store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operating system random source could not produce a token.
    #[error("secure random source unavailable: {0}")]
    RandomSource(#[from] rand::rand_core::OsError),

    /// No session token is attached to the request.
    #[error("no session token, the `TokenSession` middleware is required")]
    MissingToken,
}

impl ResponseError for SessionError {
    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
