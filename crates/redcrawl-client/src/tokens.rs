//! Credential storage for the access/refresh token pair.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Token pair issued by `/auth/token` and `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access: &str, refresh: &str) -> Self {
        Self {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }
}

/// Durable key-value storage for the credential pair.
///
/// Both tokens are always written together and removed together. Getters
/// return an empty string when nothing is stored. Token contents are never
/// inspected; expiry shows up as a 401 from the backend.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> String;
    fn refresh_token(&self) -> String;
    fn set_tokens(&self, access: &str, refresh: &str);
    fn clear_tokens(&self);
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::new();
        store.set_tokens(access, refresh);
        store
    }

    /// Current pair, if any.
    pub fn pair(&self) -> Option<TokenPair> {
        self.pair
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> String {
        self.pair()
            .map(|p| p.access_token)
            .unwrap_or_default()
    }

    fn refresh_token(&self) -> String {
        self.pair()
            .map(|p| p.refresh_token)
            .unwrap_or_default()
    }

    fn set_tokens(&self, access: &str, refresh: &str) {
        let mut guard = self.pair.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        });
    }

    fn clear_tokens(&self) {
        let mut guard = self.pair.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}
