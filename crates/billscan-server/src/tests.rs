//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use billscan_core::models::DISCOUNT_STAT;
use billscan_core::test_utils::{joes_diner_analysis, malformed_analysis, sample_photo_base64};
use billscan_core::{IngestConfig, LocalStore, MockAnalyzer};
use http_body_util::BodyExt;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    db: Database,
    store_dir: TempDir,
}

fn fast_ingest_config() -> IngestConfig {
    IngestConfig {
        analysis_timeout: Duration::from_secs(5),
        retry_backoff: Duration::from_millis(1),
        ..Default::default()
    }
}

fn setup_with(mock: MockAnalyzer, config: ServerConfig) -> TestApp {
    setup_with_ingest(mock, config, fast_ingest_config())
}

fn setup_with_ingest(
    mock: MockAnalyzer,
    config: ServerConfig,
    ingest_config: IngestConfig,
) -> TestApp {
    let store_dir = TempDir::new().unwrap();
    let db = Database::in_memory().unwrap();
    let store = Arc::new(LocalStore::new(store_dir.path()).unwrap());
    let ingestor = Ingestor::new(db.clone(), store, mock.into(), ingest_config);

    TestApp {
        router: create_router(db.clone(), ingestor, config),
        db,
        store_dir,
    }
}

fn no_auth() -> ServerConfig {
    ServerConfig {
        require_auth: false,
        ..Default::default()
    }
}

fn setup_test_app() -> TestApp {
    setup_with(MockAnalyzer::with_result(joes_diner_analysis()), no_auth())
}

fn upload_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ========== Upload API Tests ==========

#[tokio::test]
async fn test_upload_and_analyse() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["vendor_name"], "Joe's Diner");
    assert_eq!(json["total"], "45.00");
    assert_eq!(
        json["items"],
        serde_json::json!([{ "item": "Burger", "price": "10.00", "quantity": "2" }])
    );
    assert_eq!(json["discount"], 4.5);

    let bill_id = json["bill_id"].as_str().unwrap();
    assert!(app.db.get_bill(bill_id).unwrap().is_some());
    assert_eq!(app.db.get_stat(DISCOUNT_STAT).unwrap().unwrap().count, 4.5);
}

#[tokio::test]
async fn test_upload_legacy_path() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(upload_request(
            "/uploadAndAnalyse",
            serde_json::json!({ "photo": format!("data:image/jpeg;base64,{}", sample_photo_base64()) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.db.count_bills().unwrap(), 1);
}

#[tokio::test]
async fn test_upload_bad_base64() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": "***not base64***" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("base64"));
    assert_eq!(app.db.count_bills().unwrap(), 0);
}

#[tokio::test]
async fn test_upload_missing_photo() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(upload_request("/api/uploadAndAnalyse", serde_json::json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "No photo provided");
}

#[tokio::test]
async fn test_upload_invalid_json() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploadAndAnalyse")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_malformed_analysis() {
    let app = setup_with(MockAnalyzer::with_result(malformed_analysis()), no_auth());

    let response = app
        .router
        .oneshot(upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = get_body_json(response).await;
    // Provider details stay in the logs
    assert_eq!(
        json["error"],
        "Receipt analysis returned an unexpected result"
    );
    assert_eq!(app.db.count_bills().unwrap(), 0);
    assert!(app.db.get_stat(DISCOUNT_STAT).unwrap().is_none());
}

#[tokio::test]
async fn test_upload_analyzer_failure() {
    let app = setup_with(MockAnalyzer::failing(), no_auth());

    let response = app
        .router
        .oneshot(upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_analyze_returns_raw_result() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(upload_request(
            "/api/analyze",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(
        json["ExpenseDocuments"][0]["SummaryFields"][0]["Type"]["Text"],
        "VENDOR_NAME"
    );
    assert_eq!(app.db.count_bills().unwrap(), 0);
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = setup_test_app();

    let body = vec![b'A'; MAX_UPLOAD_SIZE + 1];
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploadAndAnalyse")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("too large"));
    assert_eq!(app.db.count_bills().unwrap(), 0);
}

#[tokio::test]
async fn test_upload_analysis_timeout() {
    let mock = MockAnalyzer::with_result(joes_diner_analysis()).with_delay(Duration::from_millis(500));
    let ingest_config = IngestConfig {
        analysis_timeout: Duration::from_millis(20),
        analysis_attempts: 1,
        ..fast_ingest_config()
    };
    let app = setup_with_ingest(mock, no_auth(), ingest_config);

    let response = app
        .router
        .oneshot(upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Receipt analysis timed out");
    assert_eq!(app.db.count_bills().unwrap(), 0);
    assert_eq!(std::fs::read_dir(app.store_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_succeeds_when_audit_write_fails() {
    let app = setup_test_app();
    app.db
        .conn()
        .unwrap()
        .execute_batch("DROP TABLE audit_log")
        .unwrap();

    let response = app
        .router
        .oneshot(upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.db.count_bills().unwrap(), 1);
}

#[tokio::test]
async fn test_upload_flags_repeated_photo() {
    let app = setup_test_app();
    let upload = || {
        upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        )
    };

    let first = get_body_json(app.router.clone().oneshot(upload()).await.unwrap()).await;
    assert!(first.get("duplicate_of").is_none());

    let second = get_body_json(app.router.oneshot(upload()).await.unwrap()).await;
    assert_eq!(second["duplicate_of"], first["bill_id"]);
}

// ========== Bill API Tests ==========

#[tokio::test]
async fn test_bills_list_get_delete() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let bill_id = json["bill_id"].as_str().unwrap().to_string();
    let image_path = app.store_dir.path().join(json["image_key"].as_str().unwrap());
    assert!(image_path.exists());

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/bills"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["vendor_name"], "Joe's Diner");

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/bills/{}", bill_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["id"], bill_id.as_str());
    assert_eq!(json["items"][0]["item"], "Burger");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/bills/{}", bill_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!image_path.exists());

    // Deleting a bill leaves the aggregate alone
    assert_eq!(app.db.get_stat(DISCOUNT_STAT).unwrap().unwrap().count, 4.5);

    let response = app
        .router
        .oneshot(get_request(&format!("/api/bills/{}", bill_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_missing_bill() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/bills/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Bill not found");
}

#[tokio::test]
async fn test_list_bills_clamps_limit() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(get_request("/api/bills?limit=0&offset=-5"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(get_body_json(response).await.as_array().unwrap().is_empty());
}

// ========== Stats API Tests ==========

#[tokio::test]
async fn test_stats_accumulate_over_uploads() {
    let app = setup_test_app();

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(upload_request(
                "/api/uploadAndAnalyse",
                serde_json::json!({ "photo": sample_photo_base64() }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/stats/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["name"], "stats");
    assert_eq!(json["count"], 9.0);

    let response = app.router.oneshot(get_request("/api/stats")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_stat() {
    let app = setup_test_app();

    let response = app
        .router
        .oneshot(get_request("/api/stats/unknown"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Audit API Tests ==========

#[tokio::test]
async fn test_audit_records_upload() {
    let app = setup_test_app();

    app.router
        .clone()
        .oneshot(upload_request(
            "/api/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(get_request("/api/audit?limit=10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entries = app.db.list_audit_log(10).unwrap();
    let actions: Vec<_> = entries.iter().map(|e| e.action.as_str()).collect();
    assert!(actions.contains(&"upload"));
    assert!(actions.contains(&"list"));
    assert!(entries.iter().all(|e| e.user_email == "local-dev"));
}

// ========== Auth Tests ==========

fn api_key_config() -> ServerConfig {
    ServerConfig {
        api_keys: vec!["secret-key".to_string()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_auth_required_by_default() {
    let app = setup_with(MockAnalyzer::new(), api_key_config());

    let response = app.router.oneshot(get_request("/api/bills")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Authentication required");
}

#[tokio::test]
async fn test_legacy_upload_path_requires_auth() {
    let app = setup_with(MockAnalyzer::new(), api_key_config());

    let response = app
        .router
        .oneshot(upload_request(
            "/uploadAndAnalyse",
            serde_json::json!({ "photo": sample_photo_base64() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.db.count_bills().unwrap(), 0);
}

#[tokio::test]
async fn test_api_key_accepted() {
    let app = setup_with(MockAnalyzer::new(), api_key_config());

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/bills")
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let entries = app.db.list_audit_log(1).unwrap();
    assert_eq!(entries[0].user_email, "api-key");
}

#[tokio::test]
async fn test_wrong_api_key_rejected() {
    let app = setup_with(MockAnalyzer::new(), api_key_config());

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/bills")
                .header("authorization", "Bearer secret-kez")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = setup_with(MockAnalyzer::new(), api_key_config());

    let response = app.router.oneshot(get_request("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "local");
    assert_eq!(json["analyzer"], "mock");
}

#[tokio::test]
async fn test_security_headers() {
    let app = setup_test_app();

    let response = app.router.oneshot(get_request("/api/health")).await.unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
}

// ========== Unit Tests ==========

#[test]
fn test_validate_api_key() {
    let keys = vec!["abc123".to_string(), "other".to_string()];
    assert!(validate_api_key("abc123", &keys));
    assert!(validate_api_key("other", &keys));
    assert!(!validate_api_key("abc124", &keys));
    assert!(!validate_api_key("abc", &keys));
    assert!(!validate_api_key("abc123", &[]));
}

#[test]
fn test_parse_trusted_networks() {
    let nets = parse_trusted_networks("192.168.1.0/24, 10.0.0.5,,garbage");
    assert_eq!(nets.len(), 2);

    let inside: std::net::IpAddr = "192.168.1.77".parse().unwrap();
    let single: std::net::IpAddr = "10.0.0.5".parse().unwrap();
    let outside: std::net::IpAddr = "10.0.0.6".parse().unwrap();
    assert!(is_ip_trusted(&inside, &nets));
    assert!(is_ip_trusted(&single, &nets));
    assert!(!is_ip_trusted(&outside, &nets));
}

#[test]
fn test_get_user_email() {
    let mut headers = axum::http::HeaderMap::new();
    assert_eq!(get_user_email(&headers), "local-dev");

    headers.insert("authorization", "Bearer anything".parse().unwrap());
    assert_eq!(get_user_email(&headers), "api-key");
}

#[test]
fn test_core_error_status_mapping() {
    use billscan_core::Error as E;

    let cases = [
        (E::InvalidData("x".into()), StatusCode::BAD_REQUEST),
        (E::NotFound("x".into()), StatusCode::NOT_FOUND),
        (E::MalformedInput("x".into()), StatusCode::BAD_GATEWAY),
        (E::Analysis("x".into()), StatusCode::BAD_GATEWAY),
        (E::Storage("x".into()), StatusCode::BAD_GATEWAY),
        (E::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
        (E::TotalOutOfRange("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        (E::Encryption("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (err, status) in cases {
        assert_eq!(AppError::from(err).status(), status);
    }

    let other = AppError::from(anyhow::anyhow!("boom"));
    assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
