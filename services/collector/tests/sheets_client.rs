use collector::{Backoff, Credentials, FetchError, SheetsClient};
use parser::Cell;
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, credentials: Credentials) -> SheetsClient {
    SheetsClient::new(&server.uri(), credentials)
        .unwrap()
        .with_backoff(Backoff::new(vec![Duration::from_millis(1); 5]))
}

#[tokio::test]
async fn list_worksheets_returns_titles_in_order() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "sheets": [
            {"properties": {"title": "Financial Data"}},
            {"properties": {"title": "Config"}}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-123"))
        .and(query_param("key", "k1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let titles = client(&server, Credentials::ApiKey("k1".into()))
        .list_worksheets("sheet-123")
        .await
        .expect("titles");
    assert_eq!(titles, vec!["Financial Data", "Config"]);
}

#[tokio::test]
async fn get_values_maps_cells_and_sends_bearer_token() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "range": "'Financial Data'!A1:C3",
        "majorDimension": "ROWS",
        "values": [
            ["", "Revenues"],
            ["Month", "Total Revenues", "Insurance"],
            ["01/2024", "1,000", ""]
        ]
    });
    Mock::given(method("GET"))
        // the space arrives percent-encoded
        .and(path_regex(r"^/v4/spreadsheets/sheet-123/values/'Financial(%20| )Data'$"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let table = client(&server, Credentials::Bearer("tok".into()))
        .get_values("sheet-123", "Financial Data")
        .await
        .expect("values");
    assert_eq!(table.name, "Financial Data");
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.rows[0], vec![Cell::Empty, Cell::text("Revenues")]);
    assert_eq!(table.rows[2][1], Cell::text("1,000"));
}

#[tokio::test]
async fn empty_worksheet_has_no_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/s/values/'Blank'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"range": "Blank!A1:Z1000"})))
        .mount(&server)
        .await;

    let table = client(&server, Credentials::ApiKey("k".into()))
        .get_values("s", "Blank")
        .await
        .expect("values");
    assert!(table.is_empty());
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/s"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/s"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sheets": [{"properties": {"title": "Only"}}]
        })))
        .mount(&server)
        .await;

    let titles = client(&server, Credentials::ApiKey("k".into()))
        .list_worksheets("s")
        .await
        .expect("titles after backoff");
    assert_eq!(titles, vec!["Only"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn persistent_rate_limit_exhausts_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client(&server, Credentials::ApiKey("k".into()))
        .list_worksheets("s")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RateLimited { attempts: 5 }));
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn permission_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let err = client(&server, Credentials::ApiKey("k".into()))
        .list_worksheets("s")
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("PERMISSION_DENIED"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_spreadsheet_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Requested entity was not found."))
        .mount(&server)
        .await;

    let err = client(&server, Credentials::ApiKey("k".into()))
        .get_values("missing", "Sheet1")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NotFound(_)));
}
