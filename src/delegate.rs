use poem::Request;

use crate::{session_storage::Entries, SessionToken};

/// Describes the session entry a hook is being invoked for.
#[derive(Clone, Copy)]
pub struct SessionAccess<'a> {
    pub(crate) token: &'a SessionToken,
    pub(crate) key: &'a str,
    pub(crate) request: Option<&'a Request>,
}

impl<'a> SessionAccess<'a> {
    /// Returns the token of the session being accessed.
    #[inline]
    pub fn token(&self) -> &'a SessionToken {
        self.token
    }

    /// Returns the entry key being accessed.
    #[inline]
    pub fn key(&self) -> &'a str {
        self.key
    }

    /// Returns the request that triggered the access, if the store was
    /// called with one.
    #[inline]
    pub fn request(&self) -> Option<&'a Request> {
        self.request
    }
}

/// Hooks that observe or alter reads and writes of a
/// [`SessionStore`](crate::SessionStore).
///
/// Every method has a pass-through default, so an implementation only
/// overrides the hooks it cares about. Hooks run synchronously on the task
/// handling the request and must not block.
///
/// The store keeps only a weak reference to its delegate. The caller owns
/// the `Arc` and the hooks stop running once it is dropped.
pub trait SessionDelegate<T>: Send + Sync {
    /// Called before a value is written. The returned value is stored in
    /// place of `value`; returning `None` removes the entry instead.
    fn will_store(&self, access: SessionAccess<'_>, value: Option<T>) -> Option<T> {
        let _ = access;
        value
    }

    /// Called with the stored value before it is returned. Returning `false`
    /// makes the read return `None` and skips the remaining read hooks.
    fn should_return(&self, access: SessionAccess<'_>, value: Option<&T>) -> bool {
        let _ = (access, value);
        true
    }

    /// Called with the stored value before it is returned. A `Some` result
    /// is returned to the caller in place of the stored value.
    fn will_return(&self, access: SessionAccess<'_>, value: Option<&T>) -> Option<T> {
        let _ = (access, value);
        None
    }

    /// Called with the value that was actually returned by a read.
    fn did_return(&self, access: SessionAccess<'_>, value: Option<&T>) {
        let _ = (access, value);
    }

    /// Called after the background sweep evicts an expired session.
    fn deleted(&self, token: &SessionToken, entries: &Entries<T>) {
        let _ = (token, entries);
    }
}
