//! # Source Kinds
//!
//! Each reader serves a fixed subset of the format tags. The check happens
//! here, before any request goes out.

use crate::decode::{decode, DecodeOptions, FormatTag, JsonFlavor};
use crate::errors::ReadError;
use crate::types::Decoded;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    PublicSheet,
    PublicDrive,
    PrivateSheet,
    PrivateDrive,
    CloudStorage,
}

impl SourceKind {
    /// The tags this source accepts. Private sheets are read through the values
    /// API and take no tag at all.
    pub fn supported_formats(&self) -> &'static [FormatTag] {
        match self {
            SourceKind::PublicSheet => &[FormatTag::Csv],
            SourceKind::PublicDrive => &[FormatTag::Csv, FormatTag::Xlsx, FormatTag::Json],
            SourceKind::PrivateSheet => &[],
            SourceKind::PrivateDrive => &FormatTag::ALL,
            SourceKind::CloudStorage => &[
                FormatTag::Csv,
                FormatTag::Parquet,
                FormatTag::Json,
                FormatTag::Txt,
            ],
        }
    }

    pub fn json_flavor(&self) -> JsonFlavor {
        match self {
            SourceKind::CloudStorage => JsonFlavor::Extended,
            _ => JsonFlavor::Plain,
        }
    }

    /// Parses `tag` and checks it against [`Self::supported_formats`]. Tags
    /// whose decoder feature is disabled are rejected too.
    pub fn parse_format(&self, tag: &str) -> Result<FormatTag, ReadError> {
        let unsupported = || ReadError::UnsupportedFormat {
            format: tag.to_string(),
            source_kind: *self,
        };
        let format: FormatTag = tag.parse().map_err(|_| unsupported())?;
        if format.is_available() && self.supported_formats().contains(&format) {
            Ok(format)
        } else {
            Err(unsupported())
        }
    }

    /// Decodes a payload fetched from this source. The JSON flavor is the
    /// source's, whatever `options` says.
    pub fn decode(
        &self,
        payload: &[u8],
        format: FormatTag,
        options: &DecodeOptions,
    ) -> Result<Decoded, ReadError> {
        if !self.supported_formats().contains(&format) {
            return Err(ReadError::UnsupportedFormat {
                format: format.to_string(),
                source_kind: *self,
            });
        }
        let options = DecodeOptions {
            json: self.json_flavor(),
            ..options.clone()
        };
        Ok(decode(payload, format, &options)?)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::PublicSheet => "public Google Sheets",
            SourceKind::PublicDrive => "public Google Drive files",
            SourceKind::PrivateSheet => "private Google Sheets",
            SourceKind::PrivateDrive => "private Google Drive files",
            SourceKind::CloudStorage => "Google Cloud Storage",
        })
    }
}

/// Returns the resource id embedded in a Google URL: the second-to-last
/// `/`-delimited segment (`.../d/{id}/edit`, `.../file/d/{id}/view`).
pub fn extract_resource_id(url: &str) -> Result<&str, ReadError> {
    let mut segments = url.rsplit('/');
    segments.next();
    match segments.next() {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ReadError::InvalidSource(format!(
            "no resource id in '{url}', expected '.../<id>/<action>'"
        ))),
    }
}
