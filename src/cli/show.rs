use super::Context;
use crate::config::Config;
use crate::error::Result;
use crate::sheets::{TokenState, TokenStore};
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum ShowResource {
    /// Show configuration and option store paths
    Paths,

    /// Show whether a usable Google token is stored
    Token,
}

impl ShowResource {
    pub fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            ShowResource::Paths => show_paths(ctx),
            ShowResource::Token => show_token(ctx),
        }
    }
}

fn show_paths(ctx: &Context) -> Result<()> {
    let config_path = Config::config_file()?;
    let options_path = ctx.config.options_file()?;

    info!(path = ?config_path, "Config path");
    info!(path = ?options_path, "Options path");

    Ok(())
}

fn show_token(ctx: &Context) -> Result<()> {
    let tokens = TokenStore::new(ctx.options.clone());

    match tokens.state(ctx.config.google.expiry_margin_secs)? {
        TokenState::NoToken => info!("No token stored, run `authorize`"),
        TokenState::Valid(record) => info!(
            expires_at = record.expires_at(),
            refreshable = record.refresh_token.is_some(),
            "Token valid"
        ),
        TokenState::Expired(record) => info!(
            expires_at = record.expires_at(),
            refreshable = record.refresh_token.is_some(),
            "Token expired"
        ),
    }

    Ok(())
}
