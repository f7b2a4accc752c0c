//! Client tests against a mock credits API.

use credits_client::{Charge, ClientError, ClientOptions, CreditsClient};
use credits_core::{AccountId, Feature};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> CreditsClient {
    CreditsClient::with_options(
        server.uri(),
        "svc-key",
        ClientOptions::with_service_name("keyword-tool"),
    )
    .unwrap()
}

#[tokio::test]
async fn charge_feature_posts_debit() {
    let server = MockServer::start().await;
    let account_id = AccountId::generate();

    Mock::given(method("POST"))
        .and(path("/v1/credits/debit"))
        .and(header("x-api-key", "svc-key"))
        .and(header("x-service-name", "keyword-tool"))
        .and(body_json(json!({
            "account_id": account_id.to_string(),
            "feature": "keyword_research",
            "quantity": 2,
            "idempotency_key": "job-9"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "account_id": account_id.to_string(),
            "debited": 10,
            "total_credits": 90,
            "transaction_ids": ["01HZZZZZZZZZZZZZZZZZZZZZZZ"],
            "duplicate": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .charge_feature(&account_id, Feature::KeywordResearch, 2, Some("job-9"))
        .await
        .unwrap();

    assert_eq!(response.debited, 10);
    assert_eq!(response.total_credits, 90);
    assert!(!response.duplicate);
}

#[tokio::test]
async fn insufficient_credits_is_typed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/credits/debit"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "code": "insufficient_credits",
                "message": "insufficient credits: available=1, required=5",
                "details": { "available": 1, "required": 5 }
            }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .charge_feature(&AccountId::generate(), Feature::KeywordResearch, 1, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::InsufficientCredits {
            available: 1,
            required: 5
        }
    ));
}

#[tokio::test]
async fn check_sends_amount_charge() {
    let server = MockServer::start().await;
    let account_id = AccountId::generate();

    Mock::given(method("POST"))
        .and(path("/v1/credits/check"))
        .and(body_json(json!({
            "account_id": account_id.to_string(),
            "amount": 12
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sufficient": true,
            "total_credits": 40,
            "required": 12
        })))
        .mount(&server)
        .await;

    let response = client_for(&server)
        .check(&account_id, Charge::amount(12))
        .await
        .unwrap();

    assert!(response.sufficient);
    assert_eq!(response.required, 12);
}

#[tokio::test]
async fn other_errors_keep_code_and_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/credits/check"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "forbidden", "message": "forbidden" }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .check(&AccountId::generate(), Charge::amount(1))
        .await
        .unwrap_err();

    match err {
        ClientError::Api { code, status, .. } => {
            assert_eq!(code, "forbidden");
            assert_eq!(status, 403);
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_is_reported_as_unknown() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/credits/balance"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_balance("jwt").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Api { ref code, status: 502, .. } if code == "unknown"
    ));
}
