use std::path::{Path, PathBuf};
use std::process::Output;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// An isolated CLI environment: its own credential file, pointed at a mock API.
pub struct CliEnv {
    pub server: MockServer,
    _dir: tempfile::TempDir,
    store: PathBuf,
}

impl CliEnv {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = dir.path().join("session.json");
        Self {
            server,
            _dir: dir,
            store,
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store
    }

    pub fn api_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.server.address().port())
    }

    /// Run the CLI binary with arguments.
    pub async fn run(&self, args: &[&str]) -> Output {
        tokio::process::Command::new(env!("CARGO_BIN_EXE_frontdesk"))
            .args(args)
            .arg("--store")
            .arg(&self.store)
            .env("FRONTDESK_API", self.api_url())
            .env_remove("FRONTDESK_CONFIG")
            .env_remove("FRONTDESK_STORE")
            .env_remove("FRONTDESK_PASSWORD")
            .env("NO_COLOR", "1")
            .output()
            .await
            .expect("Failed to execute CLI")
    }

    /// Run the CLI and expect success.
    pub async fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args).await;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Run the CLI and expect failure.
    pub async fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args).await;
        if output.status.success() {
            panic!("CLI command should have failed: {:?}", args);
        }
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    /// Mount a login endpoint issuing `t1` / `r1`, then log in.
    pub async fn login(&self) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "t1",
                "refreshToken": "r1",
                "user": {
                    "id": "u-1",
                    "email": "manager@example.com",
                    "role": "hotel_manager"
                }
            })))
            .mount(&self.server)
            .await;

        self.run_success(&[
            "login",
            "--email",
            "manager@example.com",
            "--password",
            "secret123",
        ])
        .await;
    }
}
