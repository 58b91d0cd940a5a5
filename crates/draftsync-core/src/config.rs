//! Runtime configuration for draft sync clients.
//!
//! Values come from an optional JSON file, then environment overrides. Only
//! public endpoints and tunables live here; auth tokens never do.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::TokenProvider;
use crate::broadcast::BroadcastHub;
use crate::models::{OwnerId, TaskDomain};
use crate::remote::RemoteSyncClient;
use crate::{Error, Result};

pub const API_BASE_URL_ENV: &str = "DRAFTSYNC_API_BASE_URL";
pub const SYNC_DELAY_ENV: &str = "DRAFTSYNC_SYNC_DELAY_MS";

const DEFAULT_SYNC_DELAY_MS: u64 = 2000;
const DEFAULT_BROADCAST_CAPACITY: usize = 64;
const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DraftSyncConfig {
    /// Task API origin; without it sessions run local-only
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_sync_delay_ms")]
    pub sync_delay_ms: u64,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
}

impl Default for DraftSyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            sync_delay_ms: DEFAULT_SYNC_DELAY_MS,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            submit_timeout_secs: DEFAULT_SUBMIT_TIMEOUT_SECS,
        }
    }
}

impl DraftSyncConfig {
    /// Parse and validate a JSON config payload.
    pub fn parse(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validated()
    }

    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(payload) => Self::parse(&payload),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// [`load`](Self::load) followed by process environment overrides
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` (normally the process environment)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(API_BASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.api_base_url = Some(url);
        }
        if let Some(raw) = lookup(SYNC_DELAY_ENV).filter(|raw| !raw.trim().is_empty()) {
            self.sync_delay_ms = raw.trim().parse().map_err(|_| {
                Error::InvalidInput(format!("{SYNC_DELAY_ENV} must be a whole number of ms"))
            })?;
        }
        self.validated()
    }

    fn validated(mut self) -> Result<Self> {
        self.api_base_url = match self.api_base_url.take() {
            Some(raw) => normalize_base_url(&raw)
                .map_err(|message| Error::InvalidInput(format!("api_base_url {message}")))?,
            None => None,
        };
        if self.broadcast_capacity == 0 {
            return Err(Error::InvalidInput(
                "broadcast_capacity must be at least 1".to_string(),
            ));
        }
        if self.submit_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "submit_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    pub const fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync_delay_ms)
    }

    pub const fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    /// Hub shared by every tab opened from this configuration
    #[must_use]
    pub fn broadcast_hub(&self) -> BroadcastHub {
        BroadcastHub::new(self.broadcast_capacity)
    }

    /// Backend client for `domain`/`owner`, or `None` without an API base URL
    pub fn remote_client(
        &self,
        domain: TaskDomain,
        owner: OwnerId,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Option<RemoteSyncClient>> {
        let Some(base_url) = self.api_base_url.as_deref() else {
            return Ok(None);
        };
        let client = RemoteSyncClient::new(base_url, domain, owner, tokens)?
            .with_submit_timeout(self.submit_timeout());
        Ok(Some(client))
    }
}

/// Trim an API origin and drop trailing slashes; `Ok(None)` when blank
pub(crate) fn normalize_base_url(raw: &str) -> std::result::Result<Option<String>, &'static str> {
    let url = raw.trim().trim_end_matches('/');
    if url.is_empty() {
        Ok(None)
    } else if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Some(url.to_string()))
    } else {
        Err("must include http:// or https://")
    }
}

const fn default_sync_delay_ms() -> u64 {
    DEFAULT_SYNC_DELAY_MS
}

const fn default_broadcast_capacity() -> usize {
    DEFAULT_BROADCAST_CAPACITY
}

const fn default_submit_timeout_secs() -> u64 {
    DEFAULT_SUBMIT_TIMEOUT_SECS
}
