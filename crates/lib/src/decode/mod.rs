//! # Format Decoder
//!
//! Maps a raw payload and a [`FormatTag`] to a [`Decoded`] value. Each tag has
//! exactly one decoder; options that only matter to one decoder are ignored by
//! the others.

mod csv;
mod json;
#[cfg(feature = "parquet")]
mod parquet;
mod text;
#[cfg(feature = "xlsx")]
mod xlsx;

pub use self::csv::{decode_csv, CsvOptions};
pub use self::json::decode_json;
#[cfg(feature = "parquet")]
pub use self::parquet::decode_parquet;
pub use self::text::{decode_text, ErrorPolicy, TextEncoding};
#[cfg(feature = "xlsx")]
pub use self::xlsx::decode_xlsx;

use crate::errors::DecodeError;
use crate::types::Decoded;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The closed set of payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Csv,
    Xlsx,
    Json,
    Parquet,
    Txt,
}

impl FormatTag {
    pub const ALL: [FormatTag; 5] = [
        FormatTag::Csv,
        FormatTag::Xlsx,
        FormatTag::Json,
        FormatTag::Parquet,
        FormatTag::Txt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Csv => "csv",
            FormatTag::Xlsx => "xlsx",
            FormatTag::Json => "json",
            FormatTag::Parquet => "parquet",
            FormatTag::Txt => "txt",
        }
    }

    /// Whether the decoder for this tag was compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            FormatTag::Xlsx => cfg!(feature = "xlsx"),
            FormatTag::Parquet => cfg!(feature = "parquet"),
            _ => true,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        FormatTag::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == tag)
            .ok_or_else(|| DecodeError::UnsupportedFormat(s.to_string()))
    }
}

/// Selects a worksheet by zero-based position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::Index(i) => write!(f, "#{i}"),
            SheetSelector::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for SheetSelector {
    type Err = std::convert::Infallible;

    /// Digits select by position, anything else by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(index) => SheetSelector::Index(index),
            Err(_) => SheetSelector::Name(s.to_string()),
        })
    }
}

/// How `json` payloads are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonFlavor {
    #[default]
    Plain,
    /// MongoDB extended JSON (`$oid`, `$date`, `$numberLong`, ...).
    Extended,
}

/// Parser settings forwarded to the decoder selected by the format tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    #[serde(default)]
    pub csv: CsvOptions,
    /// Worksheet to read from an `xlsx` workbook; the first one when unset.
    #[serde(default)]
    pub sheet: Option<SheetSelector>,
    /// Columns to read from a `parquet` file; all when unset.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub encoding: TextEncoding,
    #[serde(default)]
    pub errors: ErrorPolicy,
    #[serde(default)]
    pub json: JsonFlavor,
}

/// Decodes `payload` with the decoder registered for `format`.
pub fn decode(
    payload: &[u8],
    format: FormatTag,
    options: &DecodeOptions,
) -> Result<Decoded, DecodeError> {
    debug!("Decoding {} byte payload as {format}", payload.len());
    match format {
        FormatTag::Csv => decode_csv(payload, &options.csv).map(Decoded::Table),
        #[cfg(feature = "xlsx")]
        FormatTag::Xlsx => decode_xlsx(
            payload,
            options.sheet.as_ref().unwrap_or(&SheetSelector::Index(0)),
            options.csv.has_header,
        )
        .map(Decoded::Table),
        #[cfg(not(feature = "xlsx"))]
        FormatTag::Xlsx => Err(DecodeError::UnsupportedFormat(format.to_string())),
        FormatTag::Json => decode_json(payload, options.json),
        #[cfg(feature = "parquet")]
        FormatTag::Parquet => {
            decode_parquet(payload, options.columns.as_deref()).map(Decoded::Table)
        }
        #[cfg(not(feature = "parquet"))]
        FormatTag::Parquet => Err(DecodeError::UnsupportedFormat(format.to_string())),
        FormatTag::Txt => decode_text(payload, options.encoding, options.errors).map(Decoded::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tag_parsing() {
        assert_eq!("csv".parse::<FormatTag>().unwrap(), FormatTag::Csv);
        assert_eq!(" Parquet ".parse::<FormatTag>().unwrap(), FormatTag::Parquet);
        assert!(matches!(
            "yaml".parse::<FormatTag>(),
            Err(DecodeError::UnsupportedFormat(tag)) if tag == "yaml"
        ));
    }

    #[test]
    fn test_sheet_selector_parsing() {
        assert_eq!("2".parse::<SheetSelector>().unwrap(), SheetSelector::Index(2));
        assert_eq!(
            "Totals".parse::<SheetSelector>().unwrap(),
            SheetSelector::Name("Totals".to_string())
        );
    }

    #[test]
    fn test_decoding_is_idempotent() {
        let options = DecodeOptions::default();
        for (payload, format) in [
            (&b"a,b\n1,2\n3,4"[..], FormatTag::Csv),
            (&br#"{"x": 1, "y": [2, 3]}"#[..], FormatTag::Json),
            (&b"hello"[..], FormatTag::Txt),
        ] {
            let first = decode(payload, format, &options).unwrap();
            let second = decode(payload, format, &options).unwrap();
            assert_eq!(first, second, "{format} decoding should be idempotent");
        }
    }
}
