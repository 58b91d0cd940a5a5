//! Bearer token access for backend calls.
//!
//! Authentication itself lives outside this crate; the sync components only
//! ask for the current token and treat its absence as "skip the call".

use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Source of the bearer token attached to every backend request.
pub trait TokenProvider: Send + Sync {
    /// Current token, or `None` when the user is signed out
    fn access_token(&self) -> Option<String>;
}

/// Token that can be replaced or cleared while sessions are running.
#[derive(Default)]
pub struct SharedToken {
    token: RwLock<Option<String>>,
}

impl SharedToken {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(clean_token(token)),
        }
    }

    pub fn set(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = clean_token(token);
    }

    pub fn clear(&self) {
        self.set(None);
    }
}

fn clean_token(token: Option<String>) -> Option<String> {
    token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

impl TokenProvider for SharedToken {
    fn access_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for SharedToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = self.access_token().is_some();
        formatter
            .debug_struct("SharedToken")
            .field("token", if present { &"[REDACTED]" } else { &"None" })
            .finish()
    }
}
