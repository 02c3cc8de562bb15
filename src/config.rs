use std::time::Duration;

use poem::web::cookie::{Cookie, CookieJar, CookieKey, SameSite};

use crate::SessionToken;

const DEFAULT_COOKIE_NAME: &str = "perfect-session";
const DEFAULT_EXPIRATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Cookie security for the session token.
pub enum CookieSecurity {
    /// Use the raw cookie value.
    Plain,

    /// Use the key to encrypt the cookie value.
    Private(CookieKey),

    /// Sign the cookie value with the key.
    Signed(CookieKey),
}

/// Configuration for [`SessionStore`](crate::SessionStore).
pub struct SessionConfig {
    security: CookieSecurity,
    cookie_name: String,
    path: String,
    domain: Option<String>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
    expiration: Duration,
    sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            security: CookieSecurity::Plain,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: None,
            expiration: DEFAULT_EXPIRATION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Create a new `plain` SessionConfig.
    pub fn new() -> Self {
        Default::default()
    }

    /// Create a new `private` SessionConfig.
    pub fn private(key: CookieKey) -> Self {
        Self {
            security: CookieSecurity::Private(key),
            ..Default::default()
        }
    }

    /// Create a new `signed` SessionConfig.
    pub fn signed(key: CookieKey) -> Self {
        Self {
            security: CookieSecurity::Signed(key),
            ..Default::default()
        }
    }

    /// Sets the name of the session cookie. Default is `perfect-session`.
    #[must_use]
    pub fn cookie_name(self, value: impl Into<String>) -> Self {
        Self {
            cookie_name: value.into(),
            ..self
        }
    }

    /// Sets the `Path` to the session cookie. Default is `/`.
    #[must_use]
    pub fn path(self, value: impl Into<String>) -> Self {
        Self {
            path: value.into(),
            ..self
        }
    }

    /// Sets the `Domain` to the session cookie.
    #[must_use]
    pub fn domain(self, value: impl Into<String>) -> Self {
        Self {
            domain: Some(value.into()),
            ..self
        }
    }

    /// Sets the `Secure` to the session cookie. Default is `false`.
    ///
    /// **NOTE: production deployments served over HTTPS should enable this.**
    #[must_use]
    pub fn secure(self, value: bool) -> Self {
        Self {
            secure: value,
            ..self
        }
    }

    /// Sets the `HttpOnly` to the session cookie. Default is `true`.
    #[must_use]
    pub fn http_only(self, value: bool) -> Self {
        Self {
            http_only: value,
            ..self
        }
    }

    /// Sets the `SameSite` to the session cookie.
    #[must_use]
    pub fn same_site(self, value: impl Into<Option<SameSite>>) -> Self {
        Self {
            same_site: value.into(),
            ..self
        }
    }

    /// Sets the TTL(time-to-live) of session data, also used as the cookie
    /// `MaxAge`. Default is 365 days.
    ///
    /// Every write restarts the TTL window of the whole session.
    #[must_use]
    pub fn expiration(self, value: Duration) -> Self {
        Self {
            expiration: value,
            ..self
        }
    }

    /// Specify the period to clean up expired sessions. Default is 60
    /// seconds.
    ///
    /// The first sweep runs one period after the store is created. A zero
    /// period is raised to one millisecond.
    #[must_use]
    pub fn sweep_interval(self, value: Duration) -> Self {
        Self {
            sweep_interval: value,
            ..self
        }
    }

    /// Returns the name of the session cookie.
    #[inline]
    pub fn get_cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Returns the TTL(time-to-live) of session data.
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.expiration
    }

    /// Returns the period between two sweeps.
    #[inline]
    pub fn get_sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Set the session token cookie to `CookieJar`.
    pub fn set_cookie_value(&self, cookie_jar: &CookieJar, token: &SessionToken) {
        let mut cookie = Cookie::new_with_str(&self.cookie_name, token.as_str());

        cookie.set_path(&self.path);

        if let Some(domain) = &self.domain {
            cookie.set_domain(domain);
        }

        cookie.set_secure(self.secure);
        cookie.set_http_only(self.http_only);
        cookie.set_max_age(self.expiration);
        cookie.set_same_site(self.same_site);

        match &self.security {
            CookieSecurity::Plain => cookie_jar.add(cookie),
            CookieSecurity::Private(key) => cookie_jar.private_with_key(key).add(cookie),
            CookieSecurity::Signed(key) => cookie_jar.signed_with_key(key).add(cookie),
        }
    }

    /// Gets the session token from `CookieJar`.
    ///
    /// Returns `None` if the cookie is missing or does not hold a well-formed
    /// token.
    pub fn get_cookie_value(&self, cookie_jar: &CookieJar) -> Option<SessionToken> {
        let cookie = match &self.security {
            CookieSecurity::Plain => cookie_jar.get(&self.cookie_name),
            CookieSecurity::Private(key) => {
                cookie_jar.private_with_key(key).get(&self.cookie_name)
            }
            CookieSecurity::Signed(key) => cookie_jar.signed_with_key(key).get(&self.cookie_name),
        };
        cookie.and_then(|cookie| SessionToken::parse(cookie.value_str()))
    }
}
