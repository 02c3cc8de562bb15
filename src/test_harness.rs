use std::{collections::BTreeMap, time::Duration};

use poem::{
    http::{header, HeaderValue},
    web::cookie::Cookie,
    Endpoint, IntoResponse, Request,
};
use tokio::time::Instant;

use crate::{SessionStorage, SessionToken};

/// A client that keeps the cookies it receives between calls.
#[derive(Default)]
pub(crate) struct TestClient {
    cookies: BTreeMap<String, String>,
    set_cookie_count: usize,
}

impl TestClient {
    pub(crate) async fn call(&mut self, ep: &impl Endpoint, uri: &str) -> String {
        let mut req = Request::builder().uri(uri.parse().unwrap()).finish();

        let mut cookie = String::new();
        for (name, value) in &self.cookies {
            cookie += &format!("{name}={value};");
        }
        if !cookie.is_empty() {
            req.headers_mut()
                .insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        }

        let mut resp = ep.call(req).await.unwrap().into_response();
        for s in resp.headers().get_all(header::SET_COOKIE) {
            if let Ok(s) = s.to_str() {
                let cookie = Cookie::parse(s).unwrap();
                self.set_cookie_count += 1;

                if cookie.value_str().is_empty() {
                    self.cookies.remove(cookie.name());
                } else {
                    self.cookies
                        .insert(cookie.name().to_string(), cookie.value_str().to_string());
                }
            }
        }

        resp.take_body().into_string().await.unwrap()
    }

    pub(crate) fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub(crate) fn cookies(&self) -> BTreeMap<String, String> {
        self.cookies.clone()
    }

    /// Number of `Set-Cookie` headers received so far.
    pub(crate) fn set_cookie_count(&self) -> usize {
        self.set_cookie_count
    }
}

/// Checks the behavior every `SessionStorage` must share. Expects a paused
/// clock.
pub(crate) async fn test_storage(storage: impl SessionStorage<String>) {
    let a1 = SessionToken::generate().unwrap();
    let a2 = SessionToken::generate().unwrap();
    let ttl = Duration::from_secs(3);

    assert!(storage.load(&a1).await.unwrap().is_none());

    storage
        .update_entry(&a1, "a", Some("1".to_string()), ttl)
        .await
        .unwrap();
    storage
        .update_entry(&a1, "b", Some("2".to_string()), ttl)
        .await
        .unwrap();
    storage
        .update_entry(&a2, "c", Some("3".to_string()), ttl * 2)
        .await
        .unwrap();

    let entries = storage.load(&a1).await.unwrap().unwrap().into_value();
    assert_eq!(
        entries,
        BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string())
        ])
    );

    assert_eq!(
        storage.load_entry(&a1, "b", Instant::now()).await.unwrap(),
        Some("2".to_string())
    );
    assert_eq!(storage.load_entry(&a1, "z", Instant::now()).await.unwrap(), None);

    storage.update_entry(&a1, "a", None, ttl).await.unwrap();
    let entries = storage.load(&a1).await.unwrap().unwrap().into_value();
    assert_eq!(entries.get("a"), None);
    assert_eq!(entries.get("b").map(String::as_str), Some("2"));

    tokio::time::advance(Duration::from_secs(5)).await;
    let now = Instant::now();

    let expired = storage.expired_entries(now).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].0, a1);
    assert_eq!(storage.expired_tokens(now).await.unwrap(), vec![a1.clone()]);
    assert_eq!(storage.load_entry(&a1, "b", now).await.unwrap(), None);

    let removed = storage.remove_expired(&a1, now).await.unwrap().unwrap();
    assert_eq!(removed.value().get("b").map(String::as_str), Some("2"));
    assert!(storage.load(&a1).await.unwrap().is_none());
    assert!(storage.remove_expired(&a2, now).await.unwrap().is_none());
    assert!(storage.load(&a2).await.unwrap().is_some());

    let discarded = storage
        .update_entry(&a2, "d", Some("4".to_string()), ttl)
        .await
        .unwrap();
    assert!(discarded.is_none());

    storage.store(&a2, None).await.unwrap();
    assert!(storage.load(&a2).await.unwrap().is_none());
    assert!(storage.expired_entries(now).await.unwrap().is_empty());
}
