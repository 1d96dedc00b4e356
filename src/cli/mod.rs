mod auth;
mod settings;
mod sheet;
mod show;

use crate::config::Config;
use crate::error::Result;
use crate::options::{FileOptionStore, OptionStore};
use crate::settings::Settings;
use crate::sheets::{GoogleAuth, SheetsClient};
use clap::{Parser, Subcommand};
use std::sync::Arc;

pub use settings::SettingsArgs;
pub use show::ShowResource;

#[derive(Parser, Debug)]
#[command(name = "gsheet-integration")]
#[command(about = "Read and write cells of a Google Sheets spreadsheet", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let ctx = Context::load()?;

        match &self.command {
            Commands::Settings(args) => args.execute(&ctx),
            Commands::Authorize { listen, force } => auth::authorize(&ctx, *listen, *force).await,
            Commands::Callback { input, code, state } => {
                auth::callback(&ctx, input.as_deref(), code.clone(), state.clone()).await
            }
            Commands::View => sheet::view(&ctx),
            Commands::Read => sheet::read(&ctx).await,
            Commands::Insert { row, column, data } => {
                sheet::insert(&ctx, *row, *column, data.clone()).await
            }
            Commands::Show { resource } => resource.execute(&ctx),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save OAuth client data and the target spreadsheet
    Settings(SettingsArgs),

    /// Start the Google authorization flow
    Authorize {
        /// Wait on the redirect URI for Google's callback
        #[arg(long)]
        listen: bool,

        /// Authorize again even if a usable token is stored
        #[arg(long)]
        force: bool,
    },

    /// Complete authorization with the URL Google redirected to
    Callback {
        /// Redirect URL, its query string, or the bare code
        input: Option<String>,

        #[arg(long, conflicts_with = "input")]
        code: Option<String>,

        #[arg(long, conflicts_with = "input")]
        state: Option<String>,
    },

    /// Print the browser URL of the configured sheet
    View,

    /// Print every row of the configured sheet
    Read,

    /// Write data into one cell
    Insert {
        /// Row number, starting at 1
        #[arg(long)]
        row: u32,

        /// Column number, starting at 1
        #[arg(long)]
        column: u32,

        /// Value to write; repeat to store a comma-joined list
        #[arg(long, required = true)]
        data: Vec<String>,
    },

    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
}

/// Loaded configuration plus the option store every command works against.
pub(crate) struct Context {
    pub(crate) config: Config,
    pub(crate) options: Arc<dyn OptionStore>,
}

impl Context {
    fn load() -> Result<Self> {
        let config = Config::load()?;
        let options = FileOptionStore::new(config.options_file()?);

        Ok(Self {
            config,
            options: Arc::new(options),
        })
    }

    pub(crate) fn settings(&self) -> Result<Settings> {
        Settings::load(self.options.as_ref())
    }

    pub(crate) fn auth(&self) -> Result<GoogleAuth> {
        let credentials = self.settings()?.credentials()?;
        GoogleAuth::new(&self.config.google, &credentials, self.options.clone())
    }

    pub(crate) async fn sheets_client(&self) -> Result<SheetsClient> {
        let settings = self.settings()?;
        let credentials = settings.credentials()?;
        let target = settings.target()?;

        SheetsClient::new(
            &self.config.google,
            &credentials,
            target,
            self.options.clone(),
        )
        .await
    }
}
