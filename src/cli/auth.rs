use super::Context;
use crate::error::{AppError, Result};
use crate::sheets::{CallbackParams, GoogleAuth, wait_for_callback};
use tracing::info;

pub(super) async fn authorize(ctx: &Context, listen: bool, force: bool) -> Result<()> {
    let auth = ctx.auth()?;

    let url = if force {
        auth.authorization_url()?.to_string()
    } else {
        match auth.get_valid_token().await {
            Ok(_) => {
                info!("Google Sheets access already authorized");
                return Ok(());
            }
            Err(AppError::AuthorizationRequired { url }) => url,
            Err(e) => return Err(e),
        }
    };

    println!("Open this URL in your browser:\n{}", url);
    println!();

    if !listen {
        println!("Then pass the URL you are redirected to to the `callback` command.");
        return Ok(());
    }

    complete_from_redirect(&auth).await
}

async fn complete_from_redirect(auth: &GoogleAuth) -> Result<()> {
    let redirect_uri = auth.redirect_uri().to_string();
    let params = tokio::task::spawn_blocking(move || wait_for_callback(&redirect_uri))
        .await
        .map_err(|e| AppError::Other(e.into()))??;

    auth.handle_callback(&params).await?;
    info!("Google Sheets access authorized");

    Ok(())
}

pub(super) async fn callback(
    ctx: &Context,
    input: Option<&str>,
    code: Option<String>,
    state: Option<String>,
) -> Result<()> {
    let params = match input {
        Some(input) => CallbackParams::parse(input)?,
        None => CallbackParams {
            code,
            state,
            error: None,
        },
    };

    let auth = ctx.auth()?;
    auth.handle_callback(&params).await?;
    info!("Google Sheets access authorized");

    Ok(())
}
