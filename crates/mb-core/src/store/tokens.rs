//! User token store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::StoredToken;

/// Storage for user access tokens, one entry per user id
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert or overwrite the token for `token.user_id`
    async fn insert(&self, token: StoredToken);

    /// Look up the token stored for a user
    async fn get(&self, user_id: &str) -> Option<StoredToken>;

    /// Number of stored users
    async fn len(&self) -> usize;
}

/// Process-lifetime token store. Entries are never evicted.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenStore {
    tokens: Arc<RwLock<HashMap<String, StoredToken>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn insert(&self, token: StoredToken) {
        let mut tokens = self.tokens.write().await;
        debug!("Storing token for user {}", token.user_id);
        tokens.insert(token.user_id.clone(), token);
    }

    async fn get(&self, user_id: &str) -> Option<StoredToken> {
        let tokens = self.tokens.read().await;
        tokens.get(user_id).cloned()
    }

    async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryTokenStore::new();
        store
            .insert(StoredToken::new("u1", "token-1", json!({"id": "u1"})))
            .await;

        let token = store.get("u1").await.unwrap();
        assert_eq!(token.access_token, "token-1");
        assert!(store.get("u2").await.is_none());
    }

    #[tokio::test]
    async fn test_relogin_overwrites() {
        let store = InMemoryTokenStore::new();
        store
            .insert(StoredToken::new("u1", "old", json!({"id": "u1"})))
            .await;
        store
            .insert(StoredToken::new("u1", "new", json!({"id": "u1"})))
            .await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("u1").await.unwrap().access_token, "new");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryTokenStore::new();
        let other = store.clone();
        other
            .insert(StoredToken::new("u1", "token", json!(null)))
            .await;
        assert_eq!(store.len().await, 1);
    }
}
