//! CLI tests against a mock administration API.
//!
//! Each test runs the `frontdesk` binary with its own credential file and a
//! wiremock server standing in for the API.

mod common;

use common::CliEnv;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_and_whoami() {
    let env = CliEnv::start().await;
    env.login().await;

    assert!(env.store_path().exists());

    let stdout = env.run_success(&["whoami"]).await;
    assert!(stdout.contains("u-1"));
    assert!(stdout.contains("hotel_manager"));

    let stdout = env.run_success(&["whoami", "--json"]).await;
    let identity: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(identity["email"], "manager@example.com");
}

#[tokio::test]
async fn test_login_rejected() {
    let env = CliEnv::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "InvalidCredentials",
            "message": "Invalid email or password"
        })))
        .mount(&env.server)
        .await;

    let stderr = env
        .run_failure(&["login", "--email", "bad@example.com", "--password", "wrong"])
        .await;
    assert!(stderr.contains("Failed to login"));
    assert!(!env.store_path().exists());
}

#[tokio::test]
async fn test_whoami_without_session() {
    let env = CliEnv::start().await;
    let stderr = env.run_failure(&["whoami"]).await;
    assert!(stderr.contains("No active session"));
}

#[tokio::test]
async fn test_request_renews_expired_token() {
    let env = CliEnv::start().await;
    env.login().await;

    Mock::given(method("GET"))
        .and(path("/api/hotels"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&env.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/hotels"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7, "name": "Seaside"}])))
        .mount(&env.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refreshToken": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "t2"})))
        .expect(1)
        .mount(&env.server)
        .await;

    let stdout = env.run_success(&["request", "GET", "/api/hotels"]).await;
    let hotels: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(hotels[0]["name"], "Seaside");

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(env.store_path()).unwrap()).unwrap();
    assert_eq!(stored["access_token"], "t2");
}

#[tokio::test]
async fn test_request_with_revoked_session_fails_and_clears() {
    let env = CliEnv::start().await;
    env.login().await;

    Mock::given(method("GET"))
        .and(path("/api/hotels"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&env.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&env.server)
        .await;

    let stderr = env.run_failure(&["request", "GET", "/api/hotels"]).await;
    assert!(stderr.contains("please sign in again"));
    assert!(!env.store_path().exists());
}

#[tokio::test]
async fn test_check_reports_validity() {
    let env = CliEnv::start().await;
    env.login().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .expect(1)
        .mount(&env.server)
        .await;

    let stdout = env.run_success(&["check"]).await;
    assert!(stdout.contains("Session is valid"));
    assert!(env.store_path().exists());
}

#[tokio::test]
async fn test_logout_clears_session() {
    let env = CliEnv::start().await;
    env.login().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(body_json(json!({"refreshToken": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&env.server)
        .await;

    let stdout = env.run_success(&["logout"]).await;
    assert!(stdout.contains("Logged out"));
    assert!(!env.store_path().exists());

    env.run_failure(&["whoami"]).await;
}

#[tokio::test]
async fn test_missing_api_url() {
    let dir = tempfile::tempdir().unwrap();
    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_frontdesk"))
        .args(["refresh", "--store"])
        .arg(dir.path().join("session.json"))
        .env_remove("FRONTDESK_API")
        .env_remove("FRONTDESK_CONFIG")
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No API URL"));
}
