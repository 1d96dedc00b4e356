use crate::error::Result;
use crate::options::{OptionStore, OptionStoreExt};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const TOKEN_KEY: &str = "access_token_info";

/// The one persisted OAuth token set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, as returned by the token endpoint
    #[serde(default)]
    pub expires_in: i64,
    /// Issued-at as seconds since Unix epoch
    #[serde(default)]
    pub created: i64,
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("created", &self.created)
            .finish()
    }
}

impl TokenRecord {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_in,
            created: Utc::now().timestamp(),
        }
    }

    pub fn expires_at(&self) -> i64 {
        self.created.saturating_add(self.expires_in)
    }

    /// A token counts as expired once fewer than `margin` seconds remain.
    /// With a zero margin this is exactly `created + expires_in < now`.
    pub fn is_expired_at(&self, now: i64, margin: i64) -> bool {
        self.expires_at() < now.saturating_add(margin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    Valid(TokenRecord),
    Expired(TokenRecord),
}

impl TokenState {
    pub fn classify(record: Option<TokenRecord>, now: i64, margin: i64) -> Self {
        match record {
            None => TokenState::NoToken,
            Some(record) if record.is_expired_at(now, margin) => TokenState::Expired(record),
            Some(record) => TokenState::Valid(record),
        }
    }
}

/// Reads and writes the token record through the option store.
#[derive(Clone)]
pub struct TokenStore {
    options: Arc<dyn OptionStore>,
}

impl TokenStore {
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self { options }
    }

    pub fn load(&self) -> Result<Option<TokenRecord>> {
        self.options.get_as(TOKEN_KEY)
    }

    /// Overwrite the stored record. Last write wins.
    pub fn save(&self, record: &TokenRecord) -> Result<()> {
        self.options.set_as(TOKEN_KEY, record)?;
        debug!(expires_at = record.expires_at(), "Saved Google token");
        Ok(())
    }

    pub fn state_at(&self, now: i64, margin: i64) -> Result<TokenState> {
        Ok(TokenState::classify(self.load()?, now, margin))
    }

    pub fn state(&self, margin: i64) -> Result<TokenState> {
        self.state_at(Utc::now().timestamp(), margin)
    }
}
