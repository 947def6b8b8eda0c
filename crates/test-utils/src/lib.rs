//! Shared fixtures for the `anyread` integration tests.
//!
//! Nothing here talks to Google: credential files point their `token_uri` at a
//! local `httpmock` server, and the payload builders produce the exact bytes a
//! real Drive or Cloud Storage download would return.

use anyhow::Result;
use httpmock::{Method, Mock, MockServer};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// PKCS#8 RSA key used to sign service-account assertions in tests.
pub const TEST_RSA_PRIVATE_KEY: &str = include_str!("../fixtures/test_rsa_private.pem");
/// Public half of [`TEST_RSA_PRIVATE_KEY`], for verifying signed assertions.
pub const TEST_RSA_PUBLIC_KEY: &str = include_str!("../fixtures/test_rsa_public.pem");

pub const TEST_CLIENT_EMAIL: &str = "reader@anyread-test.iam.gserviceaccount.com";
pub const TEST_ACCESS_TOKEN: &str = "ya29.test-access-token";

// --- Credential Files ---

/// A temporary directory holding credential files for one test.
///
/// The directory (and every file written into it) is removed on drop.
pub struct CredentialFiles {
    dir: TempDir,
}

impl CredentialFiles {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a service-account key whose token endpoint is `token_uri`.
    pub fn service_account(&self, token_uri: &str) -> Result<PathBuf> {
        let key = json!({
            "type": "service_account",
            "project_id": "anyread-test",
            "private_key_id": "test-key-id",
            "private_key": TEST_RSA_PRIVATE_KEY,
            "client_email": TEST_CLIENT_EMAIL,
            "client_id": "1234567890",
            "token_uri": token_uri,
        });
        self.write("service_account.json", &key.to_string())
    }

    /// Writes stored OAuth user credentials that must be refreshed at `token_uri`.
    pub fn authorized_user(&self, token_uri: &str) -> Result<PathBuf> {
        let creds = json!({
            "type": "authorized_user",
            "client_id": "client-id.apps.googleusercontent.com",
            "client_secret": "client-secret",
            "refresh_token": "1//refresh-token",
            "token_uri": token_uri,
        });
        self.write("authorized_user.json", &creds.to_string())
    }

    /// Writes arbitrary content, for malformed-credential tests.
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }
}

// --- Mock Endpoints ---

/// Mocks `POST /token`, answering every grant with [`TEST_ACCESS_TOKEN`].
pub fn mock_token_endpoint(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(Method::POST).path("/token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "access_token": TEST_ACCESS_TOKEN,
                "expires_in": 3599,
                "token_type": "Bearer"
            }));
    })
}

/// The token URI served by [`mock_token_endpoint`].
pub fn token_uri(server: &MockServer) -> String {
    server.url("/token")
}

// --- Payload Builders ---

#[cfg(feature = "xlsx")]
pub mod xlsx {
    use anyhow::Result;
    use rust_xlsxwriter::Workbook;

    /// A two-sheet workbook.
    ///
    /// `People`: `name, age, score` with rows `(Ada, 36, 9.5)` and `(Grace, 45, <empty>)`.
    /// `Totals`: `total` with one row `81`.
    pub fn people_workbook() -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();

        let people = workbook.add_worksheet();
        people.set_name("People")?;
        people.write_string(0, 0, "name")?;
        people.write_string(0, 1, "age")?;
        people.write_string(0, 2, "score")?;
        people.write_string(1, 0, "Ada")?;
        people.write_number(1, 1, 36)?;
        people.write_number(1, 2, 9.5)?;
        people.write_string(2, 0, "Grace")?;
        people.write_number(2, 1, 45)?;

        let totals = workbook.add_worksheet();
        totals.set_name("Totals")?;
        totals.write_string(0, 0, "total")?;
        totals.write_number(1, 0, 81)?;

        Ok(workbook.save_to_buffer()?)
    }
}

#[cfg(feature = "parquet")]
pub mod parquet {
    use anyhow::Result;
    use arrow_array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
    use arrow_schema::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;

    /// A single row group with columns `id, name, score, active`:
    /// `(1, ada, 9.5, true)`, `(2, null, 7.25, false)`, `(3, grace, 8.0, true)`.
    pub fn scores_file() -> Result<Vec<u8>> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, false),
            Field::new("active", DataType::Boolean, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec![Some("ada"), None, Some("grace")])),
            Arc::new(Float64Array::from(vec![9.5, 7.25, 8.0])),
            Arc::new(BooleanArray::from(vec![true, false, true])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns)?;

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(buffer)
    }
}
