use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Authorization required, open this URL in your browser: {url}")]
    AuthorizationRequired { url: String },

    #[error("Authorization callback error: {0}")]
    AuthorizationCallback(String),

    #[error("Token exchange with {endpoint} failed: {message}")]
    TokenExchange { endpoint: String, message: String },

    #[error("Google Sheets API request to {endpoint} failed: {message}")]
    ApiRequest { endpoint: String, message: String },

    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
