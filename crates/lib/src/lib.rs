//! # anyread
//!
//! Fetch-and-decode for Google-hosted data. The reader crates (`anyread-sheets`,
//! `anyread-drive`, `anyread-storage`) retrieve raw bytes; this crate turns
//! them into a [`Decoded`] value according to a [`FormatTag`].
//!
//! Decoding is available on its own:
//!
//! ```
//! use anyread::{decode, DecodeOptions, FormatTag};
//!
//! let decoded = decode(b"a,b\n1,2\n", FormatTag::Csv, &DecodeOptions::default()).unwrap();
//! let frame = decoded.as_table().unwrap();
//! assert_eq!(frame.columns(), ["a", "b"]);
//! ```

pub mod config;
pub mod decode;
pub mod errors;
pub mod extended_json;
pub mod fetch;
pub mod source;
pub mod types;

pub use config::{get_config, ConfigError, Endpoints, ReaderConfig};
pub use decode::{
    decode, CsvOptions, DecodeOptions, ErrorPolicy, FormatTag, JsonFlavor, SheetSelector,
    TextEncoding,
};
pub use errors::{DecodeError, ReadError};
pub use extended_json::{Document, ExtendedValue, ObjectId};
pub use source::{extract_resource_id, SourceKind};
pub use types::{Cell, DataFrame, Decoded};

pub use core_access;
