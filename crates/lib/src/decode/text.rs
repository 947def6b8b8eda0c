use crate::errors::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Character encodings understood by the `txt` decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// UTF-8 with an optional leading byte order mark, which is dropped.
    Utf8Sig,
    /// UTF-16 with the byte order taken from the BOM, little-endian without one.
    Utf16,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Utf16 => "utf-16",
            TextEncoding::Utf16Le => "utf-16-le",
            TextEncoding::Utf16Be => "utf-16-be",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Ascii => "ascii",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = DecodeError;

    /// Accepts the usual aliases: case, `-` versus `_` and a missing
    /// separator are all ignored (`UTF8`, `utf_16_le`, `iso-8859-1`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        Ok(match normalized.as_str() {
            "utf8" | "u8" | "utf" => TextEncoding::Utf8,
            "utf8sig" => TextEncoding::Utf8Sig,
            "utf16" | "u16" => TextEncoding::Utf16,
            "utf16le" => TextEncoding::Utf16Le,
            "utf16be" => TextEncoding::Utf16Be,
            "latin1" | "latin" | "l1" | "iso88591" | "8859" | "cp819" => TextEncoding::Latin1,
            "ascii" | "usascii" | "646" => TextEncoding::Ascii,
            _ => return Err(DecodeError::UnknownEncoding(s.to_string())),
        })
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TextEncoding> for String {
    fn from(value: TextEncoding) -> Self {
        value.name().to_string()
    }
}

/// What to do with bytes that are invalid in the chosen encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Strict,
    /// Substitute U+FFFD.
    Replace,
    /// Drop the offending bytes.
    Ignore,
}

impl FromStr for ErrorPolicy {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ErrorPolicy::Strict),
            "replace" => Ok(ErrorPolicy::Replace),
            "ignore" => Ok(ErrorPolicy::Ignore),
            _ => Err(DecodeError::UnknownErrorPolicy(s.to_string())),
        }
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decodes a byte payload into a string.
pub fn decode_text(
    payload: &[u8],
    encoding: TextEncoding,
    errors: ErrorPolicy,
) -> Result<String, DecodeError> {
    match encoding {
        TextEncoding::Utf8 => decode_utf8(payload, 0, encoding, errors),
        TextEncoding::Utf8Sig => match payload.strip_prefix(UTF8_BOM) {
            Some(rest) => decode_utf8(rest, UTF8_BOM.len(), encoding, errors),
            None => decode_utf8(payload, 0, encoding, errors),
        },
        TextEncoding::Utf16 => match payload {
            [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, 2, u16::from_le_bytes, encoding, errors),
            [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, 2, u16::from_be_bytes, encoding, errors),
            _ => decode_utf16(payload, 0, u16::from_le_bytes, encoding, errors),
        },
        TextEncoding::Utf16Le => decode_utf16(payload, 0, u16::from_le_bytes, encoding, errors),
        TextEncoding::Utf16Be => decode_utf16(payload, 0, u16::from_be_bytes, encoding, errors),
        TextEncoding::Latin1 => Ok(payload.iter().map(|&b| char::from(b)).collect()),
        TextEncoding::Ascii => {
            let mut out = String::with_capacity(payload.len());
            for (position, &byte) in payload.iter().enumerate() {
                if byte.is_ascii() {
                    out.push(char::from(byte));
                } else {
                    match errors {
                        ErrorPolicy::Strict => {
                            return Err(DecodeError::Text {
                                encoding: encoding.name(),
                                position,
                            })
                        }
                        ErrorPolicy::Replace => out.push(char::REPLACEMENT_CHARACTER),
                        ErrorPolicy::Ignore => {}
                    }
                }
            }
            Ok(out)
        }
    }
}

/// `offset` is the length of a stripped BOM; error positions count from the
/// start of the original payload.
fn decode_utf8(
    payload: &[u8],
    offset: usize,
    encoding: TextEncoding,
    errors: ErrorPolicy,
) -> Result<String, DecodeError> {
    match errors {
        ErrorPolicy::Strict => std::str::from_utf8(payload)
            .map(str::to_string)
            .map_err(|e| DecodeError::Text {
                encoding: encoding.name(),
                position: offset + e.valid_up_to(),
            }),
        ErrorPolicy::Replace => Ok(String::from_utf8_lossy(payload).into_owned()),
        ErrorPolicy::Ignore => Ok(payload.utf8_chunks().map(|chunk| chunk.valid()).collect()),
    }
}

fn decode_utf16(
    payload: &[u8],
    offset: usize,
    to_unit: fn([u8; 2]) -> u16,
    encoding: TextEncoding,
    errors: ErrorPolicy,
) -> Result<String, DecodeError> {
    let pairs = payload.chunks_exact(2);
    let trailing = !pairs.remainder().is_empty();
    let units = pairs.map(|pair| to_unit([pair[0], pair[1]]));

    let mut out = String::with_capacity(payload.len() / 2);
    let mut position = offset;
    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) => {
                position += c.len_utf16() * 2;
                out.push(c);
            }
            Err(_) => {
                match errors {
                    ErrorPolicy::Strict => {
                        return Err(DecodeError::Text {
                            encoding: encoding.name(),
                            position,
                        })
                    }
                    ErrorPolicy::Replace => out.push(char::REPLACEMENT_CHARACTER),
                    ErrorPolicy::Ignore => {}
                }
                position += 2;
            }
        }
    }
    if trailing {
        match errors {
            ErrorPolicy::Strict => {
                return Err(DecodeError::Text {
                    encoding: encoding.name(),
                    position,
                })
            }
            ErrorPolicy::Replace => out.push(char::REPLACEMENT_CHARACTER),
            ErrorPolicy::Ignore => {}
        }
    }
    Ok(out)
}
