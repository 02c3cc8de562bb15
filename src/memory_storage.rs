use std::{collections::HashMap, time::Duration};

use parking_lot::Mutex;
use poem::Result;
use tokio::time::Instant;

use crate::{
    session_storage::{apply_entry, split_expired, Entries, SessionStorage},
    Expiring, SessionToken,
};

/// A session storage using memory.
///
/// Nothing is persisted, every session is lost when the process stops.
pub struct MemoryStorage<T> {
    sessions: Mutex<HashMap<SessionToken, Expiring<Entries<T>>>>,
}

impl<T> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> MemoryStorage<T> {
    /// Create a `MemoryStorage`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of stored sessions, expired or not.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns `true` if no sessions are stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl<T> SessionStorage<T> for MemoryStorage<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self, token: &SessionToken) -> Result<Option<Expiring<Entries<T>>>> {
        Ok(self.sessions.lock().get(token).cloned())
    }

    async fn store(
        &self,
        token: &SessionToken,
        container: Option<Expiring<Entries<T>>>,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock();
        match container {
            Some(container) => {
                sessions.insert(token.clone(), container);
            }
            None => {
                sessions.remove(token);
            }
        }
        Ok(())
    }

    async fn expired_entries(
        &self,
        now: Instant,
    ) -> Result<Vec<(SessionToken, Expiring<Entries<T>>)>> {
        Ok(self
            .sessions
            .lock()
            .iter()
            .filter(|(_, container)| container.is_expired(now))
            .map(|(token, container)| (token.clone(), container.clone()))
            .collect())
    }

    async fn expired_tokens(&self, now: Instant) -> Result<Vec<SessionToken>> {
        Ok(self
            .sessions
            .lock()
            .iter()
            .filter(|(_, container)| container.is_expired(now))
            .map(|(token, _)| token.clone())
            .collect())
    }

    async fn load_entry(
        &self,
        token: &SessionToken,
        key: &str,
        now: Instant,
    ) -> Result<Option<T>> {
        Ok(self
            .sessions
            .lock()
            .get(token)
            .filter(|container| !container.is_expired(now))
            .and_then(|container| container.value().get(key).cloned()))
    }

    async fn remove_expired(
        &self,
        token: &SessionToken,
        now: Instant,
    ) -> Result<Option<Expiring<Entries<T>>>> {
        let mut sessions = self.sessions.lock();
        if sessions
            .get(token)
            .is_some_and(|container| container.is_expired(now))
        {
            Ok(sessions.remove(token))
        } else {
            Ok(None)
        }
    }

    async fn update_entry(
        &self,
        token: &SessionToken,
        key: &str,
        value: Option<T>,
        ttl: Duration,
    ) -> Result<Option<Expiring<Entries<T>>>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let (mut entries, expired) = split_expired(sessions.remove(token), now);
        apply_entry(&mut entries, key, value);
        sessions.insert(token.clone(), Expiring::with_created_at(entries, ttl, now));
        Ok(expired)
    }
}
