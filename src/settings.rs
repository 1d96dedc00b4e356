//! Operator settings kept in the option store.

use crate::error::{AppError, Result};
use crate::models::SpreadsheetTarget;
use crate::options::{OptionStore, OptionStoreExt};
use serde::Deserialize;
use std::fmt;

pub const OAUTH_CLIENT_KEY: &str = "oauth_client";
pub const SPREADSHEET_ID_KEY: &str = "spreadsheet_id";
pub const SHEET_ID_KEY: &str = "sheet_id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Client secret JSON as downloaded from the Google Cloud console.
    pub oauth_client: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub sheet_id: Option<String>,
}

impl Settings {
    pub fn load(store: &dyn OptionStore) -> Result<Self> {
        Ok(Self {
            oauth_client: non_empty(store.get_as(OAUTH_CLIENT_KEY)?),
            spreadsheet_id: non_empty(store.get_as(SPREADSHEET_ID_KEY)?),
            sheet_id: non_empty(store.get_as(SHEET_ID_KEY)?),
        })
    }

    /// Persist the fields that are set; unset fields keep their stored value.
    pub fn save(&self, store: &dyn OptionStore) -> Result<()> {
        if let Some(oauth_client) = &self.oauth_client {
            // Reject unusable JSON before it replaces a working value
            OAuthCredentials::from_client_secret_json(oauth_client)?;
            store.set_as(OAUTH_CLIENT_KEY, oauth_client)?;
        }
        if let Some(spreadsheet_id) = &self.spreadsheet_id {
            store.set_as(SPREADSHEET_ID_KEY, spreadsheet_id)?;
        }
        if let Some(sheet_id) = &self.sheet_id {
            store.set_as(SHEET_ID_KEY, sheet_id)?;
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<OAuthCredentials> {
        let oauth_client = self.oauth_client.as_deref().ok_or_else(|| {
            AppError::MissingConfiguration(
                "OAuth client data missing, set it with `settings --oauth-file`".to_string(),
            )
        })?;
        OAuthCredentials::from_client_secret_json(oauth_client)
    }

    pub fn target(&self) -> Result<SpreadsheetTarget> {
        match (&self.spreadsheet_id, &self.sheet_id) {
            (Some(spreadsheet_id), Some(sheet_id)) => {
                Ok(SpreadsheetTarget::new(spreadsheet_id, sheet_id))
            }
            _ => Err(AppError::MissingConfiguration(
                "Spreadsheet ID or sheet ID missing, set them with `settings`".to_string(),
            )),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// OAuth client id and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct ClientSecretFile {
    web: Option<ClientSecretEntry>,
    installed: Option<ClientSecretEntry>,
}

#[derive(Deserialize)]
struct ClientSecretEntry {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Parse `{"web": {"client_id": ..., "client_secret": ...}}`; desktop
    /// clients use `installed` instead of `web`.
    pub fn from_client_secret_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| {
            AppError::MissingConfiguration(format!("OAuth client data is not valid JSON: {}", e))
        })?;

        let entry = file.web.or(file.installed).ok_or_else(|| {
            AppError::MissingConfiguration(
                "OAuth client data has neither a `web` nor an `installed` section".to_string(),
            )
        })?;

        if entry.client_id.is_empty() || entry.client_secret.is_empty() {
            return Err(AppError::MissingConfiguration(
                "OAuth client_id and client_secret must be set".to_string(),
            ));
        }

        Ok(Self::new(entry.client_id, entry.client_secret))
    }
}
