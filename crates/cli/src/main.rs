//! # anyread: read Google-hosted data from the command line
//!
//! Each subcommand wraps one reader and prints the decoded result on stdout.
//! Logs go to stderr and are controlled with `RUST_LOG`.

mod output;

use anyhow::{anyhow, Context, Result};
use anyread::{
    config::{get_config, ReaderConfig},
    core_access::{AuthorizedSession, DRIVE_READONLY},
    CsvOptions, DecodeOptions, Decoded, ErrorPolicy, SheetSelector, TextEncoding,
};
use anyread_drive::DriveReader;
use anyread_sheets::SheetsReader;
use anyread_storage::StorageReader;
use clap::{Args, Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// YAML configuration file (defaults to ./anyread.yml when present)
    #[arg(long, global = true, env = "ANYREAD_CONFIG")]
    config: Option<String>,
    /// How to print the result
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a public Google Sheet through its CSV export
    PublicSheet {
        url: String,
    },
    /// Read a publicly shared Google Drive file (csv, xlsx, json)
    PublicDrive {
        url: String,
        #[arg(long)]
        format: String,
        #[command(flatten)]
        decode: DecodeArgs,
    },
    /// Read a private Google Sheet with a service account
    PrivateSheet {
        url: String,
        /// Service-account key (defaults to the configured credentials)
        #[arg(long)]
        credentials: Option<PathBuf>,
        /// Worksheet position or title
        #[arg(long, default_value = "0")]
        worksheet: SheetSelector,
    },
    /// Read a private Google Drive file (csv, xlsx, parquet, json, txt)
    PrivateDrive {
        url: String,
        #[arg(long)]
        format: String,
        /// Stored OAuth user credentials (authorized_user JSON)
        #[arg(long)]
        oauth_credentials: Option<PathBuf>,
        /// Service-account key, used when no OAuth credentials are given
        /// (defaults to the configured credentials)
        #[arg(long, conflicts_with = "oauth_credentials")]
        credentials: Option<PathBuf>,
        #[command(flatten)]
        decode: DecodeArgs,
    },
    /// Read an object from Google Cloud Storage (csv, parquet, json, txt)
    Storage {
        name: String,
        #[arg(long)]
        format: String,
        #[arg(long)]
        bucket: String,
        /// Cloud project (defaults to the configured project)
        #[arg(long)]
        project: Option<String>,
        /// Service-account key (defaults to the configured credentials)
        #[arg(long)]
        credentials: Option<PathBuf>,
        #[command(flatten)]
        decode: DecodeArgs,
    },
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// CSV field delimiter (a single ASCII character, or `\t`)
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,
    /// The first CSV/xlsx row is data, not a header
    #[arg(long)]
    no_header: bool,
    /// CSV lines to drop before the header
    #[arg(long, default_value_t = 0)]
    skip_rows: usize,
    /// Keep every CSV value as a string
    #[arg(long)]
    no_infer: bool,
    /// xlsx worksheet position or title
    #[arg(long)]
    sheet: Option<SheetSelector>,
    /// parquet columns to read
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,
    /// txt encoding
    #[arg(long, default_value = "utf-8", value_parser = parse_encoding)]
    encoding: TextEncoding,
    /// txt error policy
    #[arg(long, default_value = "strict", value_parser = parse_error_policy)]
    errors: ErrorPolicy,
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(format!("'{s}' is not a single ASCII character")),
    }
}

fn parse_encoding(s: &str) -> Result<TextEncoding, String> {
    s.parse().map_err(|e: anyread::DecodeError| e.to_string())
}

fn parse_error_policy(s: &str) -> Result<ErrorPolicy, String> {
    s.parse().map_err(|e: anyread::DecodeError| e.to_string())
}

impl From<&DecodeArgs> for DecodeOptions {
    fn from(args: &DecodeArgs) -> Self {
        DecodeOptions {
            csv: CsvOptions {
                delimiter: args.delimiter,
                has_header: !args.no_header,
                skip_rows: args.skip_rows,
                infer_types: !args.no_infer,
                ..Default::default()
            },
            sheet: args.sheet.clone(),
            columns: args.columns.clone(),
            encoding: args.encoding,
            errors: args.errors,
            ..Default::default()
        }
    }
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = get_config(cli.config.as_deref())?;

    let decoded = run(&cli.command, &config).await?;
    output::render(&decoded, cli.output, std::io::stdout().lock())?;
    Ok(())
}

// --- Command Handlers ---

fn credentials_or_configured(
    explicit: &Option<PathBuf>,
    config: &ReaderConfig,
) -> Result<PathBuf> {
    explicit
        .clone()
        .or_else(|| config.credentials_path.as_ref().map(PathBuf::from))
        .ok_or_else(|| {
            anyhow!(
                "No credentials given. Pass --credentials, set ANYREAD_CREDENTIALS_PATH \
                 or GOOGLE_APPLICATION_CREDENTIALS."
            )
        })
}

async fn run(command: &Commands, config: &ReaderConfig) -> Result<Decoded> {
    let endpoints = config.endpoints.clone();
    let decoded = match command {
        Commands::PublicSheet { url } => {
            let frame = SheetsReader::new(endpoints).read_public_sheet(url).await?;
            Decoded::Table(frame)
        }
        Commands::PublicDrive {
            url,
            format,
            decode,
        } => {
            DriveReader::new(endpoints)
                .read_public_drive_file(url, format, &decode.into())
                .await?
        }
        Commands::PrivateSheet {
            url,
            credentials,
            worksheet,
        } => {
            let key = credentials_or_configured(credentials, config)?;
            let frame = SheetsReader::new(endpoints)
                .read_private_sheet(&key, url, worksheet)
                .await?;
            Decoded::Table(frame)
        }
        Commands::PrivateDrive {
            url,
            format,
            oauth_credentials,
            credentials,
            decode,
        } => {
            let session = match oauth_credentials {
                Some(path) => AuthorizedSession::authorized_user(path),
                None => AuthorizedSession::service_account(
                    credentials_or_configured(credentials, config)?,
                    &[DRIVE_READONLY],
                ),
            }
            .context("Failed to load Google credentials")?;
            DriveReader::new(endpoints)
                .read_private_drive_file(url, format, &session, &decode.into())
                .await?
        }
        Commands::Storage {
            name,
            format,
            bucket,
            project,
            credentials,
            decode,
        } => {
            let key = credentials_or_configured(credentials, config)?;
            let project = project.as_deref().or(config.project.as_deref());
            info!("Reading gs://{bucket}/{name} in project {project:?}");
            StorageReader::new(endpoints)
                .read_cloud_storage_file(name, format, bucket, project, &key, &decode.into())
                .await?
        }
    };
    Ok(decoded)
}
