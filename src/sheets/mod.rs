mod auth;
mod client;
mod tokens;
mod types;

pub use auth::{CallbackParams, GoogleAuth, wait_for_callback};
pub use client::SheetsClient;
pub use tokens::{TokenState, TokenStore};

use crate::error::Result;
use crate::models::CellValue;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait SheetOperations {
    /// All rows of the configured sheet; empty when the sheet has no values.
    async fn read_all(&self) -> Result<Vec<Vec<Value>>>;

    /// Write `value` into the A1 `cell` of the configured sheet, stored as-is.
    async fn write_cell(&self, cell: &str, value: &CellValue) -> Result<()>;
}
