use std::time::Duration;

use tokio::time::Instant;

/// A value stamped with its creation time and a time-to-live.
///
/// Containers are never mutated in place. Writing new data means building a
/// new container, which also restarts the TTL window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiring<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> Expiring<V> {
    /// Create a container whose TTL window starts now.
    pub fn new(value: V, ttl: Duration) -> Self {
        Self::with_created_at(value, ttl, Instant::now())
    }

    /// Create a container whose TTL window starts at `created_at`.
    pub fn with_created_at(value: V, ttl: Duration, created_at: Instant) -> Self {
        Self {
            value,
            created_at,
            ttl,
        }
    }

    /// Returns a reference to the wrapped value.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the container, returning the wrapped value.
    #[inline]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns the instant this container was created.
    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns the TTL(time-to-live) of this container.
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the last instant at which the container is still live, or
    /// `None` if the deadline is too far in the future to represent.
    pub fn expires_at(&self) -> Option<Instant> {
        self.created_at.checked_add(self.ttl)
    }

    /// Returns `true` if `now` is strictly past `created_at + ttl`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at() {
            Some(deadline) => now > deadline,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_strictly_after_ttl() {
        let container = Expiring::new("v", Duration::from_secs(2));
        let start = container.created_at();

        assert!(!container.is_expired(start));
        assert!(!container.is_expired(start + Duration::from_secs(1)));
        assert!(!container.is_expired(start + Duration::from_secs(2)));
        assert!(container.is_expired(start + Duration::from_millis(2001)));
    }

    #[tokio::test(start_paused = true)]
    async fn new_stamps_current_time() {
        let before = Instant::now();
        tokio::time::advance(Duration::from_secs(5)).await;
        let container = Expiring::new(1, Duration::from_secs(1));

        assert_eq!(container.created_at(), before + Duration::from_secs(5));
        assert!(!container.is_expired(Instant::now()));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(container.is_expired(Instant::now()));
    }

    #[test]
    fn unrepresentable_deadline_never_expires() {
        let now = Instant::now();
        let container = Expiring::with_created_at((), Duration::MAX, now);
        assert_eq!(container.expires_at(), None);
        assert!(!container.is_expired(now + Duration::from_secs(3600)));
    }

    #[test]
    fn into_value_returns_payload() {
        let container = Expiring::new(vec![1, 2, 3], Duration::from_secs(1));
        assert_eq!(container.value(), &vec![1, 2, 3]);
        assert_eq!(container.into_value(), vec![1, 2, 3]);
    }
}
