//! # `anyread-sheets`: Google Sheets Readers
//!
//! Public sheets are read through their CSV export. Private sheets go through
//! the Sheets v4 values API with a service account, which returns every cell
//! as its formatted string.

use anyread::{
    config::Endpoints,
    core_access::{AuthorizedSession, SHEETS_READONLY},
    extract_resource_id,
    fetch::download,
    DataFrame, DecodeOptions, FormatTag, ReadError, SourceKind,
};
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};

pub use anyread::SheetSelector as Worksheet;

// --- Error Definitions ---

#[derive(Error, Debug, Clone)]
pub enum SheetError {
    #[error("Invalid Google Sheet URL: {0}")]
    InvalidUrl(String),
}

impl From<SheetError> for ReadError {
    fn from(err: SheetError) -> Self {
        match err {
            SheetError::InvalidUrl(msg) => ReadError::InvalidSource(msg),
        }
    }
}

// --- Public Helper Functions ---

/// Turns a Google Sheet URL into its CSV export URL under `docs_base`.
///
/// URLs that already ask for CSV (`/export`, `format=csv`, `output=csv`) are
/// returned unchanged. The worksheet `gid` is taken from the query string or
/// from a `#gid=` fragment.
pub fn construct_export_url(docs_base: &str, url_str: &str) -> Result<String, SheetError> {
    let parsed_url =
        Url::parse(url_str).map_err(|e| SheetError::InvalidUrl(format!("{url_str}: {e}")))?;

    let wants_csv = parsed_url
        .query_pairs()
        .any(|(k, v)| (k == "format" || k == "output") && v == "csv");
    if parsed_url.path().ends_with("/export") || wants_csv {
        return Ok(url_str.to_string());
    }

    let re = Regex::new(r"/spreadsheets/d/([a-zA-Z0-9-_]+)")
        .map_err(|e| SheetError::InvalidUrl(format!("Regex compilation failed: {e}")))?;
    let spreadsheet_id = re
        .captures(parsed_url.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            SheetError::InvalidUrl(format!("Could not find sheet ID in URL path: {url_str}"))
        })?;

    let gid = parsed_url
        .query_pairs()
        .find(|(k, _)| k == "gid")
        .map(|(_, v)| v.into_owned())
        .or_else(|| {
            parsed_url
                .fragment()
                .and_then(|f| f.strip_prefix("gid="))
                .map(str::to_string)
        });

    let base = docs_base.trim_end_matches('/');
    let mut export_url = format!("{base}/spreadsheets/d/{spreadsheet_id}/export?format=csv");
    if let Some(gid_val) = gid.filter(|g| !g.is_empty()) {
        export_url.push_str(&format!("&gid={gid_val}"));
    }

    Ok(export_url)
}

/// Quotes a worksheet title for use as an A1 range.
fn quoted_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

// --- Sheets API Payloads ---

#[derive(Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: usize,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

// --- Reader ---

/// Reads public and private Google Sheets.
#[derive(Debug, Clone, Default)]
pub struct SheetsReader {
    http: Client,
    endpoints: Endpoints,
}

impl SheetsReader {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            http: Client::new(),
            endpoints,
        }
    }

    pub fn with_client(http: Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    /// Downloads a public sheet's CSV export and decodes it.
    #[instrument(skip(self))]
    pub async fn read_public_sheet(&self, url: &str) -> Result<DataFrame, ReadError> {
        let export_url = construct_export_url(&self.endpoints.docs_base, url)?;
        info!("Fetching Google Sheet CSV from: {export_url}");
        let payload = download(self.http.get(&export_url)).await?;
        let decoded =
            SourceKind::PublicSheet.decode(&payload, FormatTag::Csv, &DecodeOptions::default())?;
        Ok(decoded.into_table().unwrap_or_default())
    }

    /// Reads one worksheet of a private sheet with a service-account key.
    #[instrument(skip(self, credentials_path))]
    pub async fn read_private_sheet(
        &self,
        credentials_path: impl AsRef<Path>,
        url: &str,
        worksheet: &Worksheet,
    ) -> Result<DataFrame, ReadError> {
        let session = AuthorizedSession::service_account(credentials_path, &[SHEETS_READONLY])?
            .with_http_client(self.http.clone());
        self.read_private_sheet_with_session(&session, url, worksheet)
            .await
    }

    /// Like [`Self::read_private_sheet`], with a session the caller already holds.
    ///
    /// Every cell comes back as [`anyread::Cell::Str`]; rows are padded with
    /// empty strings to the widest row, and the first row names the columns.
    pub async fn read_private_sheet_with_session(
        &self,
        session: &AuthorizedSession,
        url: &str,
        worksheet: &Worksheet,
    ) -> Result<DataFrame, ReadError> {
        let spreadsheet_id = extract_resource_id(url)?;
        let title = self
            .resolve_worksheet(session, spreadsheet_id, worksheet)
            .await?;

        let mut values_url = self.spreadsheet_url(spreadsheet_id)?;
        values_url
            .path_segments_mut()
            .map_err(|_| ReadError::InvalidSource(self.endpoints.sheets_api_base.clone()))?
            .push("values")
            .push(&quoted_range(&title));

        let request = session.authorize(self.http.get(values_url)).await?;
        let body = download(request).await?;
        let range: ValueRange = serde_json::from_slice(&body).map_err(anyread::DecodeError::from)?;

        let width = range.values.iter().map(Vec::len).max().unwrap_or(0);
        let grid = range
            .values
            .into_iter()
            .map(|row| {
                let mut cells: Vec<String> = row.into_iter().map(cell_text).collect();
                cells.resize(width, String::new());
                cells
            })
            .collect();
        info!("Read worksheet '{title}' of spreadsheet {spreadsheet_id}");
        Ok(DataFrame::from_string_grid(grid))
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> Result<Url, ReadError> {
        let base = self.endpoints.sheets_api_base.trim_end_matches('/');
        Url::parse(&format!("{base}/v4/spreadsheets/{spreadsheet_id}"))
            .map_err(|e| ReadError::InvalidSource(format!("{base}: {e}")))
    }

    /// Maps a worksheet selector to the title the values API expects.
    async fn resolve_worksheet(
        &self,
        session: &AuthorizedSession,
        spreadsheet_id: &str,
        worksheet: &Worksheet,
    ) -> Result<String, ReadError> {
        let url = self.spreadsheet_url(spreadsheet_id)?;
        let request = self
            .http
            .get(url)
            .query(&[("fields", "sheets.properties")]);
        let body = download(session.authorize(request).await?).await?;
        let metadata: SpreadsheetMetadata =
            serde_json::from_slice(&body).map_err(anyread::DecodeError::from)?;

        let mut sheets: Vec<SheetProperties> =
            metadata.sheets.into_iter().map(|s| s.properties).collect();
        sheets.sort_by_key(|p| p.index);

        let found = match worksheet {
            Worksheet::Index(i) => sheets.into_iter().nth(*i),
            Worksheet::Name(name) => sheets.into_iter().find(|p| &p.title == name),
        };
        found.map(|p| p.title).ok_or_else(|| {
            ReadError::NotFound(format!(
                "worksheet {worksheet} in spreadsheet {spreadsheet_id}"
            ))
        })
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// --- Shorthands ---

/// [`SheetsReader::read_public_sheet`] against the default Google endpoints.
pub async fn read_public_sheet(url: &str) -> Result<DataFrame, ReadError> {
    SheetsReader::default().read_public_sheet(url).await
}

/// [`SheetsReader::read_private_sheet`] against the default Google endpoints.
pub async fn read_private_sheet(
    credentials_path: impl AsRef<Path>,
    url: &str,
    worksheet: &Worksheet,
) -> Result<DataFrame, ReadError> {
    SheetsReader::default()
        .read_private_sheet(credentials_path, url, worksheet)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCS: &str = "https://docs.google.com";

    #[test]
    fn test_edit_url_becomes_export() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-_9/edit";
        assert_eq!(
            construct_export_url(DOCS, url).unwrap(),
            "https://docs.google.com/spreadsheets/d/1AbC-_9/export?format=csv"
        );
    }

    #[test]
    fn test_gid_from_fragment_or_query() {
        let fragment = "https://docs.google.com/spreadsheets/d/abc/edit#gid=42";
        let query = "https://docs.google.com/spreadsheets/d/abc/edit?gid=7";
        assert!(construct_export_url(DOCS, fragment)
            .unwrap()
            .ends_with("/spreadsheets/d/abc/export?format=csv&gid=42"));
        assert!(construct_export_url(DOCS, query)
            .unwrap()
            .ends_with("&gid=7"));
    }

    #[test]
    fn test_export_urls_pass_through() {
        for url in [
            "https://docs.google.com/spreadsheets/d/abc/export?format=csv&gid=3",
            "https://docs.google.com/spreadsheets/d/e/2PACX-1v/pub?output=csv",
        ] {
            assert_eq!(construct_export_url(DOCS, url).unwrap(), url);
        }
    }

    #[test]
    fn test_invalid_urls() {
        assert!(construct_export_url(DOCS, "not a url").is_err());
        assert!(construct_export_url(DOCS, "https://example.com/sheet/abc").is_err());
    }

    #[test]
    fn test_quoted_range_escapes_quotes() {
        assert_eq!(quoted_range("Q1 '24"), "'Q1 ''24'");
    }
}
