use super::SheetOperations;
use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::models::{CellValue, SpreadsheetTarget};
use crate::options::OptionStore;
use crate::settings::OAuthCredentials;
use crate::sheets::auth::GoogleAuth;
use crate::sheets::tokens::TokenRecord;
use crate::sheets::types::{UpdateValuesRequest, ValueRangeResponse};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

pub struct SheetsClient {
    client: Client,
    token: TokenRecord,
    api_base_url: String,
    target: SpreadsheetTarget,
}

impl SheetsClient {
    /// Create a new SheetsClient with authenticated access
    ///
    /// Uses the stored token, refreshing it first when it has expired. When
    /// the operator has to authorize (again), fails with
    /// `AuthorizationRequired` carrying the consent URL.
    #[instrument(name = "Authenticating to Google Sheets", skip_all)]
    pub async fn new(
        config: &GoogleConfig,
        credentials: &OAuthCredentials,
        target: SpreadsheetTarget,
        options: Arc<dyn OptionStore>,
    ) -> Result<Self> {
        let auth = GoogleAuth::new(config, credentials, options)?;
        let token = auth.get_valid_token().await?;

        Ok(Self {
            client: auth.http_client(),
            token,
            api_base_url: config.api_base_url.clone(),
            target,
        })
    }

    /// `{api}/spreadsheets/{id}/values/{range}`, with the range percent-encoded as one segment
    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| AppError::Config(format!("Invalid Sheets API URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("Invalid Sheets API URL: {}", self.api_base_url)))?
            .pop_if_empty()
            .extend([
                "spreadsheets",
                self.target.spreadsheet_id.as_str(),
                "values",
                range,
            ]);

        Ok(url)
    }

    async fn check_response(url: &Url, response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::ApiRequest {
            endpoint: url.to_string(),
            message: format!("{} - {}", status, body),
        })
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> AppError {
    AppError::ApiRequest {
        endpoint: url.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl SheetOperations for SheetsClient {
    #[instrument(name = "Reading sheet", skip_all)]
    async fn read_all(&self) -> Result<Vec<Vec<Value>>> {
        let url = self.values_url(&self.target.sheet)?;

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token.access_token)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        let response = Self::check_response(&url, response).await?;

        let range: ValueRangeResponse = response
            .json()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let rows = range.values.unwrap_or_default();
        debug!(rows = rows.len(), "Read sheet");
        Ok(rows)
    }

    #[instrument(name = "Writing cell", skip(self, value))]
    async fn write_cell(&self, cell: &str, value: &CellValue) -> Result<()> {
        let mut url = self.values_url(&self.target.cell_range(cell))?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = UpdateValuesRequest::single(value.flatten());

        let response = self
            .client
            .put(url.clone())
            .bearer_auth(&self.token.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;
        Self::check_response(&url, response).await?;

        debug!("Wrote cell");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{MemoryOptionStore, OptionStoreExt};
    use crate::sheets::tokens::TokenStore;
    use crate::sheets::tokens::test_helpers::mock_record;
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn test_config(server_url: &str) -> GoogleConfig {
        GoogleConfig {
            token_url: format!("{}/token", server_url),
            api_base_url: format!("{}/v4", server_url),
            ..Default::default()
        }
    }

    fn credentials() -> OAuthCredentials {
        OAuthCredentials::new("client-id", "client-secret")
    }

    fn options_with(record: Option<TokenRecord>) -> Arc<MemoryOptionStore> {
        let options = Arc::new(MemoryOptionStore::new());
        if let Some(record) = record {
            TokenStore::new(options.clone()).save(&record).unwrap();
        }
        options
    }

    async fn client_with_valid_token(server: &Server, sheet: &str) -> SheetsClient {
        let options = options_with(Some(mock_record(Some("refresh"), Utc::now().timestamp())));
        SheetsClient::new(
            &test_config(&server.url()),
            &credentials(),
            SpreadsheetTarget::new("ABC123", sheet),
            options,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_read_all() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v4/spreadsheets/ABC123/values/Sheet1")
            .match_header("authorization", "Bearer stored-access-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"range":"Sheet1!A1:Z1000","majorDimension":"ROWS","values":[["x","y"]]}"#)
            .create_async()
            .await;

        let client = client_with_valid_token(&server, "Sheet1").await;
        let rows = client.read_all().await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows, vec![vec![json!("x"), json!("y")]]);
    }

    #[tokio::test]
    async fn test_read_all_empty_sheet() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v4/spreadsheets/ABC123/values/Sheet1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"range":"Sheet1!A1:Z1000","majorDimension":"ROWS"}"#)
            .create_async()
            .await;

        let client = client_with_valid_token(&server, "Sheet1").await;

        assert!(client.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_all_encodes_sheet_name() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v4/spreadsheets/ABC123/values/My%20Sheet")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"values":[["1"]]}"#)
            .create_async()
            .await;

        let client = client_with_valid_token(&server, "My Sheet").await;
        client.read_all().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_all_api_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v4/spreadsheets/ABC123/values/Sheet1")
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"status":"PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let client = client_with_valid_token(&server, "Sheet1").await;

        match client.read_all().await.unwrap_err() {
            AppError::ApiRequest { endpoint, message } => {
                assert!(endpoint.ends_with("/v4/spreadsheets/ABC123/values/Sheet1"));
                assert!(message.contains("403"), "{message}");
                assert!(message.contains("PERMISSION_DENIED"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_write_cell_joins_list_values() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/v4/spreadsheets/ABC123/values/Sheet1!B3")
            .match_query(Matcher::UrlEncoded(
                "valueInputOption".into(),
                "RAW".into(),
            ))
            .match_header("authorization", "Bearer stored-access-token")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Exact(r#"{"values":[["a,b"]]}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"spreadsheetId":"ABC123","updatedCells":1}"#)
            .create_async()
            .await;

        let client = client_with_valid_token(&server, "Sheet1").await;
        client
            .write_cell("B3", &CellValue::from(vec!["a", "b"]))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_cell_single_value() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/v4/spreadsheets/ABC123/values/0!A1")
            .match_query(Matcher::UrlEncoded(
                "valueInputOption".into(),
                "RAW".into(),
            ))
            .match_body(Matcher::Json(json!({"values": [["=SUM(A2:A3)"]]})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let client = client_with_valid_token(&server, "0").await;
        client
            .write_cell("A1", &CellValue::from("=SUM(A2:A3)"))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_cell_api_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", "/v4/spreadsheets/ABC123/values/Sheet1!A1")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("Unable to parse range")
            .create_async()
            .await;

        let client = client_with_valid_token(&server, "Sheet1").await;
        let err = client
            .write_cell("A1", &CellValue::from("x"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ApiRequest { .. }));
        assert!(err.to_string().contains("Unable to parse range"));
    }

    #[tokio::test]
    async fn test_transport_error_names_endpoint() {
        // Nothing listens on port 1
        let options = options_with(Some(mock_record(Some("refresh"), Utc::now().timestamp())));
        let client = SheetsClient::new(
            &test_config("http://127.0.0.1:1"),
            &credentials(),
            SpreadsheetTarget::new("ABC123", "Sheet1"),
            options,
        )
        .await
        .unwrap();

        match client.read_all().await.unwrap_err() {
            AppError::ApiRequest { endpoint, .. } => {
                assert_eq!(endpoint, "http://127.0.0.1:1/v4/spreadsheets/ABC123/values/Sheet1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_new_without_token_requires_authorization() {
        let server = Server::new_async().await;
        let options = options_with(None);

        let result = SheetsClient::new(
            &test_config(&server.url()),
            &credentials(),
            SpreadsheetTarget::new("ABC123", "Sheet1"),
            options.clone(),
        )
        .await;

        match result {
            Err(AppError::AuthorizationRequired { url }) => {
                assert!(url.contains("access_type=offline"));
                assert!(url.contains("prompt=consent"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected authorization to be required"),
        }
        assert!(options.get_as::<String>("oauth_state").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_token_refreshed_before_api_call() {
        let mut server = Server::new_async().await;
        let expired = mock_record(Some("old-refresh"), Utc::now().timestamp() - 7200);
        let options = options_with(Some(expired.clone()));

        let refresh = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "old-refresh".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"fresh-access","expires_in":3599,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;
        let read = server
            .mock("GET", "/v4/spreadsheets/ABC123/values/Sheet1")
            .match_header("authorization", "Bearer fresh-access")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"values":[["x"]]}"#)
            .create_async()
            .await;

        let client = SheetsClient::new(
            &test_config(&server.url()),
            &credentials(),
            SpreadsheetTarget::new("ABC123", "Sheet1"),
            options.clone(),
        )
        .await
        .unwrap();
        client.read_all().await.unwrap();

        refresh.assert_async().await;
        read.assert_async().await;

        let saved = TokenStore::new(options.clone()).load().unwrap().unwrap();
        assert_eq!(saved.access_token, "fresh-access");
        assert_eq!(saved.refresh_token.as_deref(), Some("old-refresh"));
        assert!(saved.created > expired.created);

        // No authorization flow was started
        assert!(options.get_as::<String>("oauth_state").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_is_fatal() {
        let mut server = Server::new_async().await;
        let options = options_with(Some(mock_record(Some("revoked"), 0)));

        let _refresh = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;
        let read = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = SheetsClient::new(
            &test_config(&server.url()),
            &credentials(),
            SpreadsheetTarget::new("ABC123", "Sheet1"),
            options.clone(),
        )
        .await;

        assert!(matches!(result, Err(AppError::TokenExchange { .. })));
        read.assert_async().await;

        // The stored record is left untouched
        let stored = TokenStore::new(options).load().unwrap().unwrap();
        assert_eq!(stored.created, 0);
    }
}
