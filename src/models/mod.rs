pub mod cell;
pub mod target;

pub use cell::{CellValue, cell_reference};
pub use target::SpreadsheetTarget;
