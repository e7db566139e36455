//! Google Sheets v4 adapter over plain HTTPS.
//!
//! The kiosk never runs an OAuth flow. It reads an already issued bearer token
//! from `token_file` on every connect, so a token refreshed by an external
//! helper is picked up on the next reconnect.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{CellAddress, ColumnRange},
    error::RemoteFailure,
};
use tracing::{debug, info};
use url::Url;

use crate::{SheetConnector, SheetSession};

pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone)]
pub struct GoogleSheetsConfig {
    pub api_base_url: Url,
    pub spreadsheet_id: String,
    pub token_file: PathBuf,
    /// Transport-level ceiling. Callers add their own, usually shorter, bound.
    pub request_timeout: Duration,
}

pub struct GoogleSheetsConnector {
    config: GoogleSheetsConfig,
    http: Client,
}

impl GoogleSheetsConnector {
    pub fn new(config: GoogleSheetsConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl SheetConnector for GoogleSheetsConnector {
    async fn connect(&self) -> Result<Arc<dyn SheetSession>, RemoteFailure> {
        let raw = tokio::fs::read_to_string(&self.config.token_file)
            .await
            .map_err(|error| {
                RemoteFailure::rejected(format!(
                    "failed to read token file '{}': {error}",
                    self.config.token_file.display()
                ))
            })?;
        let token = parse_bearer_token(&raw).ok_or_else(|| {
            RemoteFailure::rejected(format!(
                "token file '{}' holds no access token",
                self.config.token_file.display()
            ))
        })?;

        let session = GoogleSheetsSession {
            http: self.http.clone(),
            api_base_url: self.config.api_base_url.clone(),
            spreadsheet_id: self.config.spreadsheet_id.clone(),
            token,
        };
        session.probe().await?;
        info!(
            spreadsheet_id = %self.config.spreadsheet_id,
            "sheets: session established"
        );
        Ok(Arc::new(session))
    }
}

struct GoogleSheetsSession {
    http: Client,
    api_base_url: Url,
    spreadsheet_id: String,
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: String,
    major_dimension: &'static str,
    values: [[&'a str; 1]; 1],
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheetsSession {
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteFailure> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RemoteFailure::rejected(format!(
                    "api base url '{}' cannot carry a path",
                    self.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn probe(&self) -> Result<(), RemoteFailure> {
        let url = self.endpoint(&[])?;
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("fields", "spreadsheetId")])
            .send()
            .await
            .map_err(classify_transport)?
            .error_for_status()
            .map_err(classify_transport)?;
        Ok(())
    }
}

#[async_trait]
impl SheetSession for GoogleSheetsSession {
    async fn write_cell(&self, address: &CellAddress, value: &str) -> Result<(), RemoteFailure> {
        let range = address.to_string();
        let url = self.endpoint(&["values", range.as_str()])?;
        let body = ValueRangeBody {
            range: range.clone(),
            major_dimension: "ROWS",
            values: [[value]],
        };

        self.http
            .put(url)
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?
            .error_for_status()
            .map_err(classify_transport)?;
        debug!(%range, value, "sheets: cell updated");
        Ok(())
    }

    async fn read_column(&self, range: &ColumnRange) -> Result<Vec<Option<String>>, RemoteFailure> {
        let range = range.to_string();
        let url = self.endpoint(&["values", range.as_str()])?;

        let response: ValueRangeResponse = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await
            .map_err(classify_transport)?
            .error_for_status()
            .map_err(classify_transport)?
            .json()
            .await
            .map_err(classify_transport)?;

        debug!(%range, rows = response.values.len(), "sheets: range read");
        Ok(response.values.into_iter().map(first_cell_text).collect())
    }
}

fn first_cell_text(row: Vec<Value>) -> Option<String> {
    match row.into_iter().next()? {
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Accepts a token file holding JSON (`access_token` or `token`) or a bare token.
pub fn parse_bearer_token(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.starts_with('{') {
        let parsed: Value = serde_json::from_str(raw).ok()?;
        return ["access_token", "token"]
            .iter()
            .find_map(|key| parsed.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
    }

    if raw.contains(char::is_whitespace) {
        return None;
    }
    Some(raw.to_string())
}

fn classify_transport(error: reqwest::Error) -> RemoteFailure {
    if error.is_timeout() {
        return RemoteFailure::timeout(error.to_string());
    }
    if error.is_decode() {
        return RemoteFailure::malformed(error.to_string());
    }
    match error.status() {
        Some(status) if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
            RemoteFailure::transport(error.to_string())
        }
        Some(_) => RemoteFailure::rejected(error.to_string()),
        None => RemoteFailure::transport(error.to_string()),
    }
}

#[cfg(test)]
#[path = "tests/google_tests.rs"]
mod tests;
