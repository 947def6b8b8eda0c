//! Rendering of decoded values on stdout.

use anyhow::{bail, Result};
use anyread::Decoded;
use clap::ValueEnum;
use serde_json::Value;
use std::io::Write;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Tables as CSV, everything else as JSON or raw text.
    #[default]
    Auto,
    /// Tables as CSV.
    Csv,
    /// Tables as an array of records.
    Json,
}

pub fn render<W: Write>(decoded: &Decoded, format: OutputFormat, mut out: W) -> Result<()> {
    match (decoded, format) {
        (Decoded::Table(frame), OutputFormat::Auto | OutputFormat::Csv) => {
            frame.write_csv(&mut out)?;
        }
        (Decoded::Table(frame), OutputFormat::Json) => {
            write_json(&Value::Array(frame.to_records()), &mut out)?;
        }
        (_, OutputFormat::Csv) => bail!("--output csv only applies to tabular formats"),
        (Decoded::Json(value), _) => write_json(value, &mut out)?,
        (Decoded::Document(doc), _) => write_json(&doc.to_relaxed_json(), &mut out)?,
        (Decoded::Text(text), _) => out.write_all(text.as_bytes())?,
    }
    out.flush()?;
    Ok(())
}

fn write_json<W: Write>(value: &Value, out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
