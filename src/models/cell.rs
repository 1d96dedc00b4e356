use crate::error::{AppError, Result};

/// A value written to a single cell.
///
/// Lists are not spread across columns; they are joined with commas and
/// stored in the one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Single(String),
    Many(Vec<String>),
}

impl CellValue {
    pub fn flatten(&self) -> String {
        match self {
            CellValue::Single(value) => value.clone(),
            CellValue::Many(values) => values.join(","),
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Single(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for CellValue {
    fn from(values: Vec<String>) -> Self {
        CellValue::Many(values)
    }
}

impl From<Vec<&str>> for CellValue {
    fn from(values: Vec<&str>) -> Self {
        CellValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Convert 1-based row and column numbers into an A1 reference, e.g. `(3, 2)` -> `B3`.
pub fn cell_reference(row: u32, column: u32) -> Result<String> {
    if row == 0 || column == 0 {
        return Err(AppError::InvalidCell(format!(
            "row and column start at 1 (got row {}, column {})",
            row, column
        )));
    }

    Ok(format!("{}{}", column_letters(column), row))
}

/// Bijective base-26: 1 -> A, 26 -> Z, 27 -> AA.
fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}
