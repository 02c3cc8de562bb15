use std::{collections::BTreeMap, time::Duration};

use poem::Result;
use tokio::time::Instant;

use crate::{Expiring, SessionToken};

/// All values stored for one session token.
pub type Entries<T> = BTreeMap<String, T>;

/// Represents a back-end session storage.
///
/// Storages map a [`SessionToken`] to at most one [`Expiring`] bag of
/// entries. A missing entry means the session has no data yet and is never
/// an error.
#[async_trait::async_trait]
pub trait SessionStorage<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Load the container stored for `token`.
    async fn load(&self, token: &SessionToken) -> Result<Option<Expiring<Entries<T>>>>;

    /// Insert or replace the container for `token`, or remove it when
    /// `container` is `None`.
    async fn store(
        &self,
        token: &SessionToken,
        container: Option<Expiring<Entries<T>>>,
    ) -> Result<()>;

    /// Returns a snapshot of every container that is expired at `now`.
    async fn expired_entries(
        &self,
        now: Instant,
    ) -> Result<Vec<(SessionToken, Expiring<Entries<T>>)>>;

    /// Returns the tokens of every container that is expired at `now`.
    async fn expired_tokens(&self, now: Instant) -> Result<Vec<SessionToken>> {
        Ok(self
            .expired_entries(now)
            .await?
            .into_iter()
            .map(|(token, _)| token)
            .collect())
    }

    /// Load one entry of the container stored for `token`, treating a
    /// container that is expired at `now` as missing.
    async fn load_entry(
        &self,
        token: &SessionToken,
        key: &str,
        now: Instant,
    ) -> Result<Option<T>> {
        Ok(self
            .load(token)
            .await?
            .filter(|container| !container.is_expired(now))
            .and_then(|container| container.into_value().remove(key)))
    }

    /// Remove the container for `token` only if it is still expired at
    /// `now`, returning the removed container.
    ///
    /// Implementations should perform the check and the removal atomically.
    async fn remove_expired(
        &self,
        token: &SessionToken,
        now: Instant,
    ) -> Result<Option<Expiring<Entries<T>>>> {
        match self.load(token).await? {
            Some(container) if container.is_expired(now) => {
                self.store(token, None).await?;
                Ok(Some(container))
            }
            _ => Ok(None),
        }
    }

    /// Set (or with `None`, remove) one entry and write the bag back in a
    /// new container with a fresh `ttl` window.
    ///
    /// A container that has already expired is replaced by an empty bag
    /// rather than extended, and is returned so the caller can treat it as
    /// evicted.
    async fn update_entry(
        &self,
        token: &SessionToken,
        key: &str,
        value: Option<T>,
        ttl: Duration,
    ) -> Result<Option<Expiring<Entries<T>>>> {
        let now = Instant::now();
        let (mut entries, expired) = split_expired(self.load(token).await?, now);
        apply_entry(&mut entries, key, value);
        self.store(token, Some(Expiring::with_created_at(entries, ttl, now)))
            .await?;
        Ok(expired)
    }
}

pub(crate) fn apply_entry<T>(entries: &mut Entries<T>, key: &str, value: Option<T>) {
    match value {
        Some(value) => {
            entries.insert(key.to_string(), value);
        }
        None => {
            entries.remove(key);
        }
    }
}

/// Splits a loaded container into the bag to keep writing to and the
/// container to report as evicted.
pub(crate) fn split_expired<T>(
    container: Option<Expiring<Entries<T>>>,
    now: Instant,
) -> (Entries<T>, Option<Expiring<Entries<T>>>) {
    match container {
        Some(container) if container.is_expired(now) => (Entries::new(), Some(container)),
        Some(container) => (container.into_value(), None),
        None => (Entries::new(), None),
    }
}
