use crate::error::{AppError, Result};
use url::Url;

const SPREADSHEET_VIEW_BASE: &str = "https://docs.google.com/spreadsheets/d";

/// The spreadsheet and tab that reads and writes go to.
///
/// `sheet` is whatever the Sheets API accepts as the leading part of an A1
/// range: a tab name, or the numeric grid id copied from a `gid=` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetTarget {
    pub spreadsheet_id: String,
    pub sheet: String,
}

impl SpreadsheetTarget {
    pub fn new(spreadsheet_id: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet: sheet.into(),
        }
    }

    /// Build a target from a spreadsheet URL such as
    /// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=<gid>`.
    pub fn from_url(url: &str) -> Result<Self> {
        let spreadsheet_id = extract_spreadsheet_id(url).ok_or_else(|| {
            AppError::MissingConfiguration(format!("No spreadsheet id found in URL: {}", url))
        })?;
        let sheet = extract_sheet_gid(url).ok_or_else(|| {
            AppError::MissingConfiguration(format!("No gid found in URL: {}", url))
        })?;

        Ok(Self::new(spreadsheet_id, sheet))
    }

    /// Range addressing a single cell (or sub-range) of this sheet.
    pub fn cell_range(&self, cell: &str) -> String {
        format!("{}!{}", self.sheet, cell)
    }

    /// Browser URL that opens the sheet for editing.
    pub fn view_url(&self) -> String {
        format!(
            "{}/{}/edit#gid={}",
            SPREADSHEET_VIEW_BASE, self.spreadsheet_id, self.sheet
        )
    }
}

fn parse_lenient(url: &str) -> Option<Url> {
    Url::parse(url)
        .or_else(|_| Url::parse(&format!("https://{}", url)))
        .ok()
}

/// Return the path segment following `/d/`.
pub fn extract_spreadsheet_id(url: &str) -> Option<String> {
    let url = parse_lenient(url)?;
    let mut segments = url.path_segments()?;
    segments.find(|segment| *segment == "d")?;

    segments
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Return the `gid` parameter from the query string or, failing that, the fragment.
pub fn extract_sheet_gid(url: &str) -> Option<String> {
    let url = parse_lenient(url)?;

    let from_query = url
        .query_pairs()
        .find(|(key, _)| key == "gid")
        .map(|(_, value)| value.into_owned());

    from_query
        .or_else(|| {
            url.fragment().and_then(|fragment| {
                url::form_urlencoded::parse(fragment.as_bytes())
                    .find(|(key, _)| key == "gid")
                    .map(|(_, value)| value.into_owned())
            })
        })
        .filter(|gid| !gid.is_empty())
}
