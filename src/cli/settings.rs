use super::Context;
use crate::error::{AppError, Result};
use crate::models::SpreadsheetTarget;
use crate::models::target::extract_spreadsheet_id;
use crate::settings::Settings;
use clap::Args;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// OAuth client secret JSON downloaded from the Google Cloud console
    #[arg(long)]
    pub oauth_file: Option<PathBuf>,

    #[arg(long)]
    pub spreadsheet_id: Option<String>,

    /// Sheet name or numeric grid id (gid)
    #[arg(long)]
    pub sheet_id: Option<String>,

    /// Spreadsheet URL to take the spreadsheet id and gid from
    #[arg(long, conflicts_with = "spreadsheet_id")]
    pub url: Option<String>,
}

impl SettingsArgs {
    pub fn execute(&self, ctx: &Context) -> Result<()> {
        let settings = self.to_settings()?;

        if settings == Settings::default() {
            return show_settings(&ctx.settings()?);
        }

        settings.save(ctx.options.as_ref())?;
        info!("Settings saved");

        Ok(())
    }

    fn to_settings(&self) -> Result<Settings> {
        let oauth_client = match &self.oauth_file {
            Some(path) => Some(fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read OAuth client file {:?}: {}", path, e))
            })?),
            None => None,
        };

        let (spreadsheet_id, sheet_id) = match (&self.url, &self.sheet_id) {
            // An explicit --sheet-id wins over the URL's gid
            (Some(url), Some(sheet_id)) => {
                let spreadsheet_id = extract_spreadsheet_id(url).ok_or_else(|| {
                    AppError::MissingConfiguration(format!("No spreadsheet id in URL: {}", url))
                })?;
                (Some(spreadsheet_id), Some(sheet_id.clone()))
            }
            (Some(url), None) => {
                let target = SpreadsheetTarget::from_url(url)?;
                (Some(target.spreadsheet_id), Some(target.sheet))
            }
            (None, _) => (self.spreadsheet_id.clone(), self.sheet_id.clone()),
        };

        Ok(Settings {
            oauth_client,
            spreadsheet_id,
            sheet_id,
        })
    }
}

fn show_settings(settings: &Settings) -> Result<()> {
    let client_id = settings
        .credentials()
        .map(|credentials| credentials.client_id)
        .ok();

    info!(
        client_id = client_id.as_deref().unwrap_or("<not set>"),
        spreadsheet_id = settings.spreadsheet_id.as_deref().unwrap_or("<not set>"),
        sheet_id = settings.sheet_id.as_deref().unwrap_or("<not set>"),
        "Current settings"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::test_helpers::CLIENT_SECRET_JSON;

    #[test]
    fn test_settings_from_url() {
        let args = SettingsArgs {
            url: Some("https://docs.google.com/spreadsheets/d/ABC123/edit#gid=0".to_string()),
            ..Default::default()
        };

        let settings = args.to_settings().unwrap();
        assert_eq!(settings.spreadsheet_id.as_deref(), Some("ABC123"));
        assert_eq!(settings.sheet_id.as_deref(), Some("0"));
        assert_eq!(settings.oauth_client, None);
    }

    #[test]
    fn test_sheet_id_overrides_url_gid() {
        let args = SettingsArgs {
            url: Some("https://docs.google.com/spreadsheets/d/ABC123/edit#gid=0".to_string()),
            sheet_id: Some("Sheet2".to_string()),
            ..Default::default()
        };

        let settings = args.to_settings().unwrap();
        assert_eq!(settings.sheet_id.as_deref(), Some("Sheet2"));
    }

    #[test]
    fn test_settings_from_bad_url() {
        let args = SettingsArgs {
            url: Some("https://example.com/".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            args.to_settings(),
            Err(AppError::MissingConfiguration(_))
        ));
    }

    #[test]
    fn test_url_without_gid_needs_sheet_id() {
        let url = "https://docs.google.com/spreadsheets/d/ABC123/edit".to_string();

        let args = SettingsArgs {
            url: Some(url.clone()),
            ..Default::default()
        };
        assert!(matches!(
            args.to_settings(),
            Err(AppError::MissingConfiguration(_))
        ));

        let args = SettingsArgs {
            url: Some(url),
            sheet_id: Some("Sheet1".to_string()),
            ..Default::default()
        };
        let settings = args.to_settings().unwrap();
        assert_eq!(settings.spreadsheet_id.as_deref(), Some("ABC123"));
        assert_eq!(settings.sheet_id.as_deref(), Some("Sheet1"));
    }

    #[test]
    fn test_settings_reads_oauth_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        fs::write(&path, CLIENT_SECRET_JSON).unwrap();

        let args = SettingsArgs {
            oauth_file: Some(path),
            spreadsheet_id: Some("ABC123".to_string()),
            ..Default::default()
        };

        let settings = args.to_settings().unwrap();
        assert_eq!(settings.oauth_client.as_deref(), Some(CLIENT_SECRET_JSON));
        assert_eq!(settings.spreadsheet_id.as_deref(), Some("ABC123"));
        assert_eq!(settings.sheet_id, None);
    }

    #[test]
    fn test_no_arguments_is_empty() {
        assert_eq!(
            SettingsArgs::default().to_settings().unwrap(),
            Settings::default()
        );
    }
}
