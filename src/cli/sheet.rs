use super::Context;
use crate::error::Result;
use crate::models::{CellValue, cell_reference};
use crate::sheets::SheetOperations;
use serde_json::Value;
use tracing::info;

pub(super) fn view(ctx: &Context) -> Result<()> {
    let target = ctx.settings()?.target()?;
    let url = target.view_url();

    info!(url = url, "Spreadsheet");
    println!("{}", url);

    Ok(())
}

pub(super) async fn read(ctx: &Context) -> Result<()> {
    let client = ctx.sheets_client().await?;
    let rows = client.read_all().await?;

    if rows.is_empty() {
        info!("Sheet is empty");
        return Ok(());
    }

    for line in format_rows(&rows) {
        println!("{}", line);
    }

    Ok(())
}

pub(super) async fn insert(ctx: &Context, row: u32, column: u32, data: Vec<String>) -> Result<()> {
    let client = ctx.sheets_client().await?;
    let cell = insert_data(&client, row, column, data).await?;

    info!(cell = cell, "Data inserted successfully");

    Ok(())
}

/// Write `data` at `row`/`column` and return the A1 reference written to
async fn insert_data<S>(client: &S, row: u32, column: u32, mut data: Vec<String>) -> Result<String>
where
    S: SheetOperations + Sync,
{
    let cell = cell_reference(row, column)?;
    let value = match data.len() {
        1 => CellValue::Single(data.remove(0)),
        _ => CellValue::Many(data),
    };

    client.write_cell(&cell, &value).await?;

    Ok(cell)
}

/// Tab-separated lines, one per row.
fn format_rows(rows: &[Vec<Value>]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect()
}
