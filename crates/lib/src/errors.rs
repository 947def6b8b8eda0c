use crate::source::SourceKind;
use core_access::AuthError;
use thiserror::Error;

/// A failure while turning a raw payload into a [`crate::Decoded`] value.
///
/// Parser errors keep the parser's own message so callers see exactly what the
/// underlying library reported.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported format tag: '{0}'")]
    UnsupportedFormat(String),
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Error tokenizing data: expected {expected} fields in line {line}, saw {found}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid extended JSON: {0}")]
    ExtendedJson(String),
    #[cfg(feature = "xlsx")]
    #[error("Failed to read spreadsheet: {0}")]
    Xlsx(#[from] calamine::XlsxError),
    #[error("Worksheet not found: {0}")]
    SheetNotFound(String),
    #[cfg(feature = "parquet")]
    #[error("Failed to read parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[cfg(feature = "parquet")]
    #[error("Failed to convert parquet batch: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
    #[error("'{encoding}' codec can't decode byte at position {position}")]
    Text {
        encoding: &'static str,
        position: usize,
    },
    #[error("Unknown text encoding: '{0}'")]
    UnknownEncoding(String),
    #[error("Unknown decoding error policy: '{0}'")]
    UnknownErrorPolicy(String),
}

/// The error returned by every reader.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Format '{format}' is not supported for {source_kind}")]
    UnsupportedFormat {
        format: String,
        source_kind: SourceKind,
    },
    #[error("Invalid source reference: {0}")]
    InvalidSource(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Access denied (status {status}): {url}")]
    Unauthorized { status: u16, url: String },
    #[error("Request to {url} failed with status {status}: {body}")]
    Fetch {
        url: String,
        status: u16,
        body: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
