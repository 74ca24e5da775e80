use crate::domain_model::*;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

impl From<TokenPair> for StoredTokens {
    fn from(pair: TokenPair) -> Self {
        StoredTokens {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

/// Where a client keeps its current token pair between requests.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Option<StoredTokens>;
    fn store(&self, tokens: StoredTokens);
    fn clear(&self);
}

#[derive(Default)]
pub struct MemoryTokenStorage {
    tokens: Mutex<Option<StoredTokens>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: StoredTokens) -> Self {
        MemoryTokenStorage {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<StoredTokens>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Option<StoredTokens> {
        self.slot().clone()
    }

    fn store(&self, tokens: StoredTokens) {
        *self.slot() = Some(tokens);
    }

    fn clear(&self) {
        *self.slot() = None;
    }
}
