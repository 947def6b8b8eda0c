//! # Sheets Reader Integration Tests
//!
//! A single `httpmock` server stands in for the docs export host, the token
//! endpoint and the Sheets v4 API.

use anyhow::Result;
use anyread::{config::Endpoints, Cell, ReadError};
use anyread_sheets::{SheetsReader, Worksheet};
use anyread_test_utils::{mock_token_endpoint, token_uri, CredentialFiles, TEST_ACCESS_TOKEN};
use httpmock::{Method, MockServer};
use serde_json::json;

fn reader_for(server: &MockServer) -> SheetsReader {
    SheetsReader::new(Endpoints::single_host(&server.base_url()))
}

fn mock_metadata<'a>(server: &'a MockServer, spreadsheet_id: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(Method::GET)
            .path(format!("/v4/spreadsheets/{spreadsheet_id}"))
            .query_param("fields", "sheets.properties")
            .header("Authorization", format!("Bearer {TEST_ACCESS_TOKEN}"));
        then.status(200).json_body(json!({
            "sheets": [
                { "properties": { "sheetId": 0, "title": "People", "index": 0 } },
                { "properties": { "sheetId": 981, "title": "Totals", "index": 1 } }
            ]
        }));
    })
}

#[tokio::test]
async fn test_read_public_sheet_from_edit_url() -> Result<()> {
    // --- 1. Arrange ---
    let server = MockServer::start();
    let export_mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/spreadsheets/d/sheet_id_12345/export")
            .query_param("format", "csv")
            .query_param("gid", "42");
        then.status(200)
            .header("Content-Type", "text/csv")
            .body("question,votes\nWhat is anyread?,3\nWhy CSV?,\n");
    });
    let url = format!("{}/spreadsheets/d/sheet_id_12345/edit#gid=42", server.base_url());

    // --- 2. Act ---
    let frame = reader_for(&server).read_public_sheet(&url).await?;

    // --- 3. Assert ---
    export_mock.assert();
    assert_eq!(frame.columns(), ["question", "votes"]);
    assert_eq!(frame.get(0, "votes"), Some(&Cell::Int(3)));
    assert_eq!(frame.get(1, "votes"), Some(&Cell::Null));
    Ok(())
}

#[tokio::test]
async fn test_read_public_sheet_export_url_is_fetched_as_is() -> Result<()> {
    let server = MockServer::start();
    let export_mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/spreadsheets/d/e/2PACX-published/pub")
            .query_param("output", "csv");
        then.status(200).body("a,b\n1,2\n");
    });
    let url = format!(
        "{}/spreadsheets/d/e/2PACX-published/pub?output=csv",
        server.base_url()
    );

    let frame = reader_for(&server).read_public_sheet(&url).await?;

    export_mock.assert();
    assert_eq!(frame.row(0).unwrap(), [Cell::Int(1), Cell::Int(2)]);
    Ok(())
}

#[tokio::test]
async fn test_read_public_sheet_errors() -> Result<()> {
    let server = MockServer::start();
    let missing = server.mock(|when, then| {
        when.method(Method::GET).path("/spreadsheets/d/gone/export");
        then.status(404);
    });
    let reader = reader_for(&server);

    // A URL without a sheet id never reaches the network.
    let err = reader
        .read_public_sheet("https://example.com/not-a-sheet")
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::InvalidSource(_)));

    let url = format!("{}/spreadsheets/d/gone/edit", server.base_url());
    let err = reader.read_public_sheet(&url).await.unwrap_err();
    assert!(matches!(err, ReadError::NotFound(_)));
    missing.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_read_private_sheet_pads_rows() -> Result<()> {
    // --- 1. Arrange ---
    let server = MockServer::start();
    let creds = CredentialFiles::new()?;
    let key_path = creds.service_account(&token_uri(&server))?;

    let token_mock = mock_token_endpoint(&server);
    let metadata_mock = mock_metadata(&server, "priv_sheet_1");
    let values_mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/v4/spreadsheets/priv_sheet_1/values/'People'")
            .header("Authorization", format!("Bearer {TEST_ACCESS_TOKEN}"));
        then.status(200).json_body(json!({
            "range": "People!A1:C3",
            "majorDimension": "ROWS",
            "values": [
                ["name", "age", "team"],
                ["Ada", "36"],
                ["Grace", "45", "Navy"]
            ]
        }));
    });
    let url = format!("{}/spreadsheets/d/priv_sheet_1/edit", server.base_url());

    // --- 2. Act ---
    let frame = reader_for(&server)
        .read_private_sheet(&key_path, &url, &Worksheet::default())
        .await?;

    // --- 3. Assert ---
    token_mock.assert_hits(1);
    metadata_mock.assert();
    values_mock.assert();
    assert_eq!(frame.columns(), ["name", "age", "team"]);
    assert_eq!(
        frame.row(0).unwrap(),
        [Cell::from("Ada"), Cell::from("36"), Cell::from("")]
    );
    assert_eq!(frame.get(1, "team"), Some(&Cell::from("Navy")));
    Ok(())
}

#[tokio::test]
async fn test_read_private_sheet_by_index_resolves_title() -> Result<()> {
    let server = MockServer::start();
    let creds = CredentialFiles::new()?;
    let key_path = creds.service_account(&token_uri(&server))?;
    mock_token_endpoint(&server);
    mock_metadata(&server, "priv_sheet_2");
    let totals_mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/v4/spreadsheets/priv_sheet_2/values/'Totals'");
        then.status(200)
            .json_body(json!({ "values": [["total"], ["81"]] }));
    });
    let url = format!("{}/spreadsheets/d/priv_sheet_2/edit", server.base_url());

    let frame = reader_for(&server)
        .read_private_sheet(&key_path, &url, &Worksheet::Index(1))
        .await?;

    totals_mock.assert();
    assert_eq!(frame.get(0, "total"), Some(&Cell::from("81")));
    Ok(())
}

#[tokio::test]
async fn test_read_private_sheet_missing_worksheet() -> Result<()> {
    let server = MockServer::start();
    let creds = CredentialFiles::new()?;
    let key_path = creds.service_account(&token_uri(&server))?;
    mock_token_endpoint(&server);
    mock_metadata(&server, "priv_sheet_3");
    let url = format!("{}/spreadsheets/d/priv_sheet_3/edit", server.base_url());
    let reader = reader_for(&server);

    for worksheet in [Worksheet::Index(9), Worksheet::Name("Archive".to_string())] {
        let err = reader
            .read_private_sheet(&key_path, &url, &worksheet)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ReadError::NotFound(ref what) if what.contains("priv_sheet_3")),
            "{worksheet}: {err}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_read_private_sheet_with_bad_credentials_file() -> Result<()> {
    let server = MockServer::start();
    let creds = CredentialFiles::new()?;
    let bad_key = creds.write("broken.json", "{ not json")?;
    let url = format!("{}/spreadsheets/d/priv_sheet_4/edit", server.base_url());

    let err = reader_for(&server)
        .read_private_sheet(&bad_key, &url, &Worksheet::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReadError::Auth(_)));
    Ok(())
}
