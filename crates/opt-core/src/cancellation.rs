use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Process-wide map of per-session cancellation tokens, checked at every
/// suspension point in a session's ask/tell loop (spec.md §5).
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a fresh token for `session_id`, replacing any
    /// existing one.
    pub async fn create(&self, session_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens
            .write()
            .await
            .insert(session_id.to_string(), token.clone());
        token
    }

    pub async fn get(&self, session_id: &str) -> Option<CancellationToken> {
        self.tokens.read().await.get(session_id).cloned()
    }

    /// Cancels and deregisters the token for `session_id`, if any.
    pub async fn cancel(&self, session_id: &str) {
        if let Some(token) = self.tokens.write().await.remove(session_id) {
            token.cancel();
        }
    }

    pub async fn remove(&self, session_id: &str) {
        self.tokens.write().await.remove(session_id);
    }

    /// Cancels every registered session, used on process shutdown.
    pub async fn cancel_all(&self) {
        let mut tokens = self.tokens.write().await;
        for (_, token) in tokens.drain() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_fires_the_token_issued_at_create() {
        let registry = CancellationRegistry::new();
        let token = registry.create("s1").await;
        assert!(!token.is_cancelled());
        registry.cancel("s1").await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_all_fires_every_outstanding_token() {
        let registry = CancellationRegistry::new();
        let a = registry.create("a").await;
        let b = registry.create("b").await;
        registry.cancel_all().await;
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
