use serde::{Deserialize, Serialize};
use serde_json::Value;

// https://developers.google.com/sheets/api/reference/rest/v4/spreadsheets.values#ValueRange
#[derive(Debug, Deserialize)]
pub(super) struct ValueRangeResponse {
    // Omitted entirely when the range is empty
    #[serde(default)]
    pub(super) values: Option<Vec<Vec<Value>>>,
}

/// Body of a `values.update` call.
#[derive(Debug, Serialize)]
pub(super) struct UpdateValuesRequest {
    pub(super) values: Vec<Vec<String>>,
}

impl UpdateValuesRequest {
    pub(super) fn single(value: String) -> Self {
        Self {
            values: vec![vec![value]],
        }
    }
}
