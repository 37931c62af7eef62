// Tests for SheetsClient against a mocked Sheets API
// Uses mockito for HTTP mocking

use mockito::{Matcher, Server};
use savings_metrics::sheets::fetch_workbook;
use savings_metrics::{Credentials, ServiceAccountKey, SheetNames, SheetsClient, SheetsError};
use serde_json::json;
use std::time::Duration;

const SHEET_ID: &str = "test-sheet";
const SERVICE_ACCOUNT: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/service_account.json");

// Helper to create a client pointed at the mock server
fn create_test_client(server: &Server, credentials: Credentials) -> SheetsClient {
    SheetsClient::new(SHEET_ID, credentials)
        .with_base_url(&server.url())
        .with_retry_delay(Duration::from_millis(10))
}

fn values_path(range: &str) -> String {
    format!("/{}/values/{}", SHEET_ID, range)
}

#[tokio::test]
async fn test_read_sheet_with_access_token() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", values_path("01_Members!A1:Z1000").as_str())
        .match_header("authorization", "Bearer token-123")
        .match_query(Matcher::UrlEncoded(
            "valueRenderOption".into(),
            "FORMATTED_VALUE".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "range": "'01_Members'!A1:Z1000",
                "majorDimension": "ROWS",
                "values": [["MemberID", "Name"], ["M1", "Amina"], ["M2"]]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = create_test_client(&server, Credentials::AccessToken("token-123".into()));
    let rows = client.read_sheet_rows("01_Members").await.unwrap();

    // The API omits trailing empty cells; they come back as empty strings
    assert_eq!(rows, vec![vec!["MemberID", "Name"], vec!["M1", "Amina"], vec!["M2", ""]]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_read_empty_sheet_has_no_values_field() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", values_path("04_AdministrativeCosts!A1:Z1000").as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "range": "'04_AdministrativeCosts'!A1:Z1000" }).to_string())
        .create_async()
        .await;

    let client = create_test_client(&server, Credentials::AccessToken("t".into()));
    let rows = client.read_sheet_rows("04_AdministrativeCosts").await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_api_key_is_sent_as_query_parameter() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", values_path("03_Disbursement!1:1").as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("key".into(), "AIza-test".into()),
            Matcher::UrlEncoded("valueRenderOption".into(), "FORMATTED_VALUE".into()),
        ]))
        .with_status(200)
        .with_body(json!({ "values": [["MemberID", "Date", "AmountDisbursed"]] }).to_string())
        .create_async()
        .await;

    let client = create_test_client(&server, Credentials::ApiKey("AIza-test".into()));
    let header = client.read_header("03_Disbursement").await.unwrap();

    assert_eq!(header, vec!["MemberID", "Date", "AmountDisbursed"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_sheet_reads_as_empty() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", values_path("99_Missing!A1:Z1000").as_str())
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(
            json!({
                "error": {
                    "code": 400,
                    "message": "Unable to parse range: 99_Missing!A1:Z1000",
                    "status": "INVALID_ARGUMENT"
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = create_test_client(&server, Credentials::AccessToken("t".into()));
    let rows = client.read_sheet_rows("99_Missing").await.unwrap();

    assert!(rows.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_are_retried_then_reported() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", values_path("01_Members!A1:Z1000").as_str())
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body(json!({ "error": { "code": 503, "message": "The service is currently unavailable." } }).to_string())
        .expect(3)
        .create_async()
        .await;

    let client = create_test_client(&server, Credentials::AccessToken("t".into()));
    let err = client.read_sheet_rows("01_Members").await.unwrap_err();

    match err {
        SheetsError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "The service is currently unavailable.");
        }
        other => panic!("Expected Api error, got {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_permission_denied_is_not_retried() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", values_path("01_Members!A1:Z1000").as_str())
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(json!({ "error": { "code": 403, "message": "The caller does not have permission" } }).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = create_test_client(&server, Credentials::AccessToken("t".into()));
    let err = client.read_sheet_rows("01_Members").await.unwrap_err();

    assert!(matches!(err, SheetsError::Api { status: 403, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_append_row() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", values_path("01_Members!A1:append").as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("valueInputOption".into(), "USER_ENTERED".into()),
            Matcher::UrlEncoded("insertDataOption".into(), "INSERT_ROWS".into()),
        ]))
        .match_body(Matcher::Json(json!({ "values": [["M4", "Dalia"]] })))
        .with_status(200)
        .with_body(
            json!({
                "spreadsheetId": SHEET_ID,
                "tableRange": "'01_Members'!A1:B4",
                "updates": {
                    "spreadsheetId": SHEET_ID,
                    "updatedRange": "'01_Members'!A5:B5",
                    "updatedRows": 1,
                    "updatedColumns": 2,
                    "updatedCells": 2
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = create_test_client(&server, Credentials::AccessToken("t".into())).with_writes(true);
    let result = client
        .append_row("01_Members", vec!["M4".into(), "Dalia".into()])
        .await
        .unwrap();

    assert_eq!(result.updated_range, "'01_Members'!A5:B5");
    assert_eq!(result.updated_rows, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_append_failure_is_not_retried() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", values_path("01_Members!A1:append").as_str())
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let client = create_test_client(&server, Credentials::AccessToken("t".into())).with_writes(true);
    let err = client
        .append_row("01_Members", vec!["M4".into(), "Dalia".into()])
        .await
        .unwrap_err();

    assert!(matches!(err, SheetsError::Api { status: 500, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_service_account_token_is_exchanged_once() {
    let mut server = Server::new_async().await;

    let token_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".into(),
            "urn:ietf:params:oauth:grant-type:jwt-bearer".into(),
        ))
        .with_status(200)
        .with_body(
            json!({ "access_token": "ya29.test", "expires_in": 3599, "token_type": "Bearer" })
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let values_mock = server
        .mock("GET", Matcher::Regex(format!("^/{}/values/.*", SHEET_ID)))
        .match_header("authorization", "Bearer ya29.test")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "values": [["Date", "AmountSpent"]] }).to_string())
        .expect(2)
        .create_async()
        .await;

    let mut key = ServiceAccountKey::from_file(SERVICE_ACCOUNT).unwrap();
    key.token_uri = format!("{}/token", server.url());

    let client = create_test_client(&server, Credentials::ServiceAccount(key));
    client.read_header("04_AdministrativeCosts").await.unwrap();
    client.read_header("04_AdministrativeCosts").await.unwrap();

    token_mock.assert_async().await;
    values_mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_token_exchange_is_auth_error() {
    let mut server = Server::new_async().await;

    let _token_mock = server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(json!({ "error": "invalid_grant" }).to_string())
        .create_async()
        .await;

    let mut key = ServiceAccountKey::from_file(SERVICE_ACCOUNT).unwrap();
    key.token_uri = format!("{}/token", server.url());

    let client = create_test_client(&server, Credentials::ServiceAccount(key));
    let err = client.read_sheet_rows("01_Members").await.unwrap_err();

    match err {
        SheetsError::Auth(msg) => assert!(msg.contains("invalid_grant")),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_workbook_over_client() {
    let mut server = Server::new_async().await;
    let names = SheetNames::default();

    let mut mocks = Vec::new();
    for name in names.all() {
        let mock = server
            .mock("GET", values_path(&format!("{}!A1:Z1000", name)).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "values": [[format!("{} header", name)]] }).to_string())
            .create_async()
            .await;
        mocks.push(mock);
    }

    let client = create_test_client(&server, Credentials::AccessToken("t".into()));
    let workbook = fetch_workbook(&client, &names).await.unwrap();

    assert_eq!(workbook.sheets.len(), 4);
    assert_eq!(workbook.rows(&names.members), &[vec!["01_Members header".to_string()]]);
    for mock in mocks {
        mock.assert_async().await;
    }
}
