//! Bearer credential sources.
//!
//! The client asks its [`TokenProvider`] for a token on every request, so
//! a provider backed by the host's login session picks up refreshed tokens
//! without rebuilding the client.

use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

/// Supplies the bearer token for annotation API requests.
pub trait TokenProvider: Send + Sync {
    /// Current token, or `None` when the user is not signed in.
    fn bearer_token(&self) -> Option<String>;
}

/// A token fixed at construction time (CLI, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A token the host can replace or clear as its session changes.
#[derive(Debug, Default)]
pub struct SharedToken {
    inner: RwLock<Option<String>>,
}

impl SharedToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the token. A lock poisoned by a panicking writer is
    /// recovered so the new token always takes effect.
    pub fn set(&self, token: impl Into<String>) {
        *self.write() = Some(token.into());
    }

    /// Sign out: following requests fail with `MissingCredential`.
    pub fn clear(&self) {
        *self.write() = None;
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Shared token lock was poisoned, recovering");
            self.inner.clear_poison();
            poisoned.into_inner()
        })
    }
}

impl TokenProvider for SharedToken {
    fn bearer_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
