#![allow(clippy::unwrap_used)]
// Integration tests for `Authenticator` using wiremock.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use august_api::{
    ApiClient, AuthenticationState, Authenticator, Error, LoginMethod, ValidationResult,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(cache: Option<std::path::PathBuf>) -> (MockServer, Authenticator) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ApiClient::with_client(reqwest::Client::new(), base_url);
    let authenticator = Authenticator::new(
        client,
        LoginMethod::Email,
        "user@example.com",
        SecretString::from("hunter2".to_owned()),
        Some("install-1".into()),
        cache,
    );
    (server, authenticator)
}

fn session_response(expires_in_days: i64) -> ResponseTemplate {
    let expires = Utc::now() + Duration::days(expires_in_days);
    ResponseTemplate::new(200)
        .insert_header("x-august-access-token", "tok-123")
        .set_body_json(json!({
            "expiresAt": expires.to_rfc3339(),
            "vPassword": true,
            "vEmail": true,
            "vPhone": true
        }))
}

// ── Login tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_success() {
    let (server, authenticator) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_partial_json(json!({
            "identifier": "email:user@example.com",
            "installId": "install-1"
        })))
        .respond_with(session_response(30))
        .mount(&server)
        .await;

    let authentication = authenticator.authenticate().await.unwrap();

    assert_eq!(authentication.state, AuthenticationState::Authenticated);
    assert_eq!(authentication.access_token, "tok-123");
    assert!(!authentication.is_expired());
    assert!(!authentication.should_refresh());
}

#[tokio::test]
async fn test_authenticate_bad_password() {
    let (server, authenticator) = setup(None).await;

    let expires = Utc::now() + Duration::days(30);
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-august-access-token", "tok-123")
                .set_body_json(json!({
                    "expiresAt": expires.to_rfc3339(),
                    "vPassword": false
                })),
        )
        .mount(&server)
        .await;

    let authentication = authenticator.authenticate().await.unwrap();
    assert_eq!(authentication.state, AuthenticationState::BadPassword);
}

#[tokio::test]
async fn test_authenticate_requires_validation() {
    let (server, authenticator) = setup(None).await;

    let expires = Utc::now() + Duration::days(30);
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-august-access-token", "tok-123")
                .set_body_json(json!({
                    "expiresAt": expires.to_rfc3339(),
                    "vPassword": true,
                    "vEmail": false
                })),
        )
        .mount(&server)
        .await;

    let authentication = authenticator.authenticate().await.unwrap();
    assert_eq!(authentication.state, AuthenticationState::RequiresValidation);
}

#[tokio::test]
async fn test_authenticate_connection_error() {
    // A pooled `MockServer::start()` keeps its listener alive after drop,
    // so use a non-pooled server whose port actually closes.
    let server = MockServer::builder().start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    drop(server); // nothing listening any more

    let client = ApiClient::with_client(reqwest::Client::new(), base_url);
    let authenticator = Authenticator::new(
        client,
        LoginMethod::Email,
        "user@example.com",
        SecretString::from("hunter2".to_owned()),
        None,
        None,
    );

    let result = authenticator.authenticate().await;
    match result {
        Err(ref e @ Error::Transport(_)) => assert!(e.is_connection_error()),
        other => panic!("expected Transport error, got: {other:?}"),
    }
}

// ── Token cache tests ───────────────────────────────────────────────

#[tokio::test]
async fn test_token_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join(".user@example.com.august.conf");

    let (server, authenticator) = setup(Some(cache_path.clone())).await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(session_response(30))
        .expect(1)
        .mount(&server)
        .await;

    authenticator.authenticate().await.unwrap();
    assert!(cache_path.exists());

    // A second authenticator over the same cache file never hits the
    // network: the expect(1) above would trip on a second login.
    let (_server2, cached_authenticator) = setup(Some(cache_path)).await;
    let authentication = cached_authenticator.authenticate().await.unwrap();
    assert_eq!(authentication.state, AuthenticationState::Authenticated);
    assert_eq!(authentication.access_token, "tok-123");
}

#[tokio::test]
async fn test_expired_cached_token_triggers_login() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join(".token.conf");
    let stale = json!({
        "access_token": "stale-tok",
        "access_token_expires": (Utc::now() - Duration::days(1)).to_rfc3339()
    });
    std::fs::write(&cache_path, stale.to_string()).unwrap();

    let (server, authenticator) = setup(Some(cache_path)).await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(session_response(30))
        .expect(1)
        .mount(&server)
        .await;

    let authentication = authenticator.authenticate().await.unwrap();
    assert_eq!(authentication.access_token, "tok-123");
}

// ── Refresh tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_skipped_while_token_is_fresh() {
    let (server, authenticator) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(session_response(30))
        .mount(&server)
        .await;
    let authentication = authenticator.authenticate().await.unwrap();

    // No /session/refresh mock mounted: an unexpected refresh request
    // would 404 and fail the call.
    let same = authenticator
        .refresh_access_token(&authentication, false)
        .await
        .unwrap();
    assert_eq!(same.access_token, authentication.access_token);
}

#[tokio::test]
async fn test_forced_refresh_hits_endpoint() {
    let (server, authenticator) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(session_response(30))
        .mount(&server)
        .await;
    let authentication = authenticator.authenticate().await.unwrap();

    let expires = Utc::now() + Duration::days(60);
    Mock::given(method("POST"))
        .and(path("/session/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-august-access-token", "tok-456")
                .set_body_json(json!({ "expiresAt": expires.to_rfc3339() })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let refreshed = authenticator
        .refresh_access_token(&authentication, true)
        .await
        .unwrap();
    assert_eq!(refreshed.access_token, "tok-456");
    assert!(refreshed.access_token_expires > authentication.access_token_expires);
}

// ── Verification flow tests ─────────────────────────────────────────

#[tokio::test]
async fn test_send_verification_code() {
    let (server, authenticator) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/validation/email"))
        .and(body_partial_json(json!({ "email": "user@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    authenticator.send_verification_code().await.unwrap();
}

#[tokio::test]
async fn test_validate_verification_code() {
    let (server, authenticator) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/validate/email"))
        .and(body_partial_json(json!({ "code": "123456" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let result = authenticator
        .validate_verification_code("123456")
        .await
        .unwrap();
    assert_eq!(result, ValidationResult::Validated);
}

#[tokio::test]
async fn test_validate_verification_code_rejected() {
    let (server, authenticator) = setup(None).await;

    Mock::given(method("POST"))
        .and(path("/validate/email"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({})))
        .mount(&server)
        .await;

    let result = authenticator
        .validate_verification_code("000000")
        .await
        .unwrap();
    assert_eq!(result, ValidationResult::InvalidVerificationCode);
}
