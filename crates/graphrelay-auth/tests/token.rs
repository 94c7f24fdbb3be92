//! Token endpoint behaviour against a mock identity provider.

use graphrelay_auth::{AuthError, Authenticator, Credentials, OAuth2Config};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/contoso/oauth2/v2.0/token";

fn credentials() -> Credentials {
    Credentials {
        client_id: "app-id".to_string(),
        tenant_id: "contoso".to_string(),
        client_secret: "s3cret".to_string(),
        mailbox: "shared@contoso.com".to_string(),
    }
}

fn authenticator(server: &MockServer) -> Authenticator {
    let creds = credentials();
    Authenticator::new(&creds, creds.oauth2_config(&server.uri())).unwrap()
}

fn token_body(token: &str, expires_in: u64) -> serde_json::Value {
    json!({
        "token_type": "Bearer",
        "expires_in": expires_in,
        "access_token": token
    })
}

#[tokio::test]
async fn test_token_is_cached_until_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_secret=s3cret"))
        .and(body_string_contains("graph.microsoft.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let auth = authenticator(&server);
    for _ in 0..3 {
        assert_eq!(auth.access_token().await.unwrap(), "tok-1");
    }
}

#[tokio::test]
async fn test_expired_token_is_reacquired_once_per_call() {
    let server = MockServer::start().await;
    // 30 seconds is inside the expiry skew, so every cached token is stale
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short-lived", 30)))
        .expect(2)
        .mount(&server)
        .await;

    let auth = authenticator(&server);
    auth.access_token().await.unwrap();
    auth.access_token().await.unwrap();
}

#[tokio::test]
async fn test_invalidate_forces_single_reacquisition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 3600)))
        .expect(2)
        .mount(&server)
        .await;

    let auth = authenticator(&server);
    auth.access_token().await.unwrap();
    auth.invalidate().await;
    auth.access_token().await.unwrap();
    auth.access_token().await.unwrap();
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let auth = authenticator(&server);
    match auth.access_token().await {
        Err(AuthError::InvalidCredentials(msg)) => assert!(msg.contains("AADSTS7000215")),
        other => panic!("expected InvalidCredentials, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let creds = credentials();
    // Port 9 (discard) is closed on test machines
    let config = OAuth2Config::for_tenant("http://127.0.0.1:9", "contoso");
    let auth = Authenticator::new(&creds, config).unwrap();

    let err = auth.access_token().await.unwrap_err();
    assert!(err.is_network(), "unexpected error: {:?}", err);
}
