//! In-process session store.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{SessionAttributes, SessionStore};
use crate::LtiResult;

/// [`SessionStore`] backed by a concurrent hash map.
///
/// Sessions live until deleted or until the process exits, which makes this
/// store suitable for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionAttributes>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no session is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> LtiResult<Option<SessionAttributes>> {
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    async fn set(&self, id: &str, attributes: SessionAttributes) -> LtiResult<()> {
        self.sessions.insert(id.to_string(), attributes);
        Ok(())
    }

    async fn delete(&self, id: &str) -> LtiResult<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemorySessionStore::new();
        assert!(store.get("a").await.unwrap().is_none());

        let mut attrs = SessionAttributes::new();
        attrs.insert("lti_authenticated".into(), json!(true));
        store.set("a", attrs.clone()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(attrs));
        assert_eq!(store.len(), 1);

        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        store.delete("a").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = InMemorySessionStore::new();
        let mut first = SessionAttributes::new();
        first.insert("x".into(), json!(1));
        first.insert("y".into(), json!(2));
        store.set("s", first).await.unwrap();

        let mut second = SessionAttributes::new();
        second.insert("x".into(), json!(3));
        store.set("s", second.clone()).await.unwrap();

        assert_eq!(store.get("s").await.unwrap(), Some(second));
    }
}
