//! # Cloud Storage Reader Integration Tests

use anyhow::Result;
use anyread::{config::Endpoints, Cell, DecodeOptions, ExtendedValue, ReadError};
use anyread_storage::StorageReader;
use anyread_test_utils::{
    mock_token_endpoint, parquet::scores_file, token_uri, CredentialFiles, TEST_ACCESS_TOKEN,
};
use httpmock::{Method, Mock, MockServer};
use serde_json::json;

const BUCKET: &str = "analytics-exports";

fn reader_for(server: &MockServer) -> StorageReader {
    StorageReader::new(Endpoints::single_host(&server.base_url()))
}

fn mock_bucket(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(Method::GET)
            .path(format!("/storage/v1/b/{BUCKET}"))
            .header("Authorization", format!("Bearer {TEST_ACCESS_TOKEN}"));
        then.status(200).json_body(json!({
            "kind": "storage#bucket",
            "name": BUCKET,
            "location": "US",
            "projectNumber": "123456789"
        }));
    })
}

#[tokio::test]
async fn test_extended_json_object() -> Result<()> {
    // --- 1. Arrange ---
    let server = MockServer::start();
    let creds = CredentialFiles::new()?;
    let key_path = creds.service_account(&token_uri(&server))?;
    let token_mock = mock_token_endpoint(&server);
    let bucket_mock = mock_bucket(&server);
    // The object name contains `/`, which travels percent-encoded; match on
    // fragments that hold either way.
    let object_mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path_contains(format!("/storage/v1/b/{BUCKET}/o/"))
            .path_contains("users.json")
            .query_param("alt", "media");
        then.status(200).body(
            r#"[{"_id": {"$oid": "5f1a2b3c4d5e6f7a8b9c0d1e"},
                 "signup": {"$date": {"$numberLong": "1700000000000"}},
                 "visits": {"$numberLong": "42"}}]"#,
        );
    });

    // --- 2. Act ---
    let decoded = reader_for(&server)
        .read_cloud_storage_file(
            "exports/2024/users.json",
            "json",
            BUCKET,
            Some("analytics-prod"),
            &key_path,
            &DecodeOptions::default(),
        )
        .await?;

    // --- 3. Assert ---
    token_mock.assert_hits(1);
    bucket_mock.assert();
    object_mock.assert();

    let users = decoded
        .as_document()
        .and_then(ExtendedValue::as_array)
        .expect("an array of documents");
    let user = &users[0];
    assert!(matches!(user.get("_id"), Some(ExtendedValue::ObjectId(_))));
    assert!(matches!(user.get("signup"), Some(ExtendedValue::DateTime(_))));
    assert_eq!(user.get("visits"), Some(&ExtendedValue::Int64(42)));
    Ok(())
}

#[tokio::test]
async fn test_parquet_and_csv_objects() -> Result<()> {
    let server = MockServer::start();
    let creds = CredentialFiles::new()?;
    let key_path = creds.service_account(&token_uri(&server))?;
    mock_token_endpoint(&server);
    mock_bucket(&server);
    let parquet = scores_file()?;
    server.mock(|when, then| {
        when.method(Method::GET)
            .path(format!("/storage/v1/b/{BUCKET}/o/scores.parquet"));
        then.status(200).body(parquet.clone());
    });
    server.mock(|when, then| {
        when.method(Method::GET)
            .path(format!("/storage/v1/b/{BUCKET}/o/daily.csv"));
        then.status(200).body("day,total\n2024-01-01,10\n2024-01-02,12\n");
    });
    let reader = reader_for(&server);

    let scores = reader
        .read_cloud_storage_file(
            "scores.parquet",
            "parquet",
            BUCKET,
            None,
            &key_path,
            &DecodeOptions::default(),
        )
        .await?;
    assert_eq!(scores.as_table().unwrap().get(2, "name"), Some(&Cell::from("grace")));

    let daily = reader
        .read_cloud_storage_file(
            "daily.csv",
            "csv",
            BUCKET,
            None,
            &key_path,
            &DecodeOptions::default(),
        )
        .await?;
    let frame = daily.as_table().unwrap();
    assert_eq!(frame.get(1, "day"), Some(&Cell::from("2024-01-02")));
    assert_eq!(frame.get(1, "total"), Some(&Cell::Int(12)));
    Ok(())
}

#[tokio::test]
async fn test_unsupported_format_checked_before_credentials() -> Result<()> {
    let server = MockServer::start();
    let any_request = server.mock(|when, then| {
        when.path_contains("/");
        then.status(200);
    });

    let err = reader_for(&server)
        .read_cloud_storage_file(
            "report.xlsx",
            "xlsx",
            BUCKET,
            None,
            "/no/such/key.json",
            &DecodeOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ReadError::UnsupportedFormat { .. }));
    any_request.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_missing_bucket_and_object() -> Result<()> {
    let server = MockServer::start();
    let creds = CredentialFiles::new()?;
    let key_path = creds.service_account(&token_uri(&server))?;
    mock_token_endpoint(&server);
    mock_bucket(&server);
    server.mock(|when, then| {
        when.method(Method::GET).path("/storage/v1/b/no-such-bucket");
        then.status(404).json_body(json!({"error": {"code": 404}}));
    });
    server.mock(|when, then| {
        when.method(Method::GET)
            .path(format!("/storage/v1/b/{BUCKET}/o/missing.txt"));
        then.status(404);
    });
    let reader = reader_for(&server);

    let err = reader
        .read_cloud_storage_file(
            "a.txt",
            "txt",
            "no-such-bucket",
            None,
            &key_path,
            &DecodeOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::NotFound(ref url) if url.contains("no-such-bucket")));

    let err = reader
        .read_cloud_storage_file(
            "missing.txt",
            "txt",
            BUCKET,
            None,
            &key_path,
            &DecodeOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::NotFound(ref url) if url.contains("missing.txt")));
    Ok(())
}
