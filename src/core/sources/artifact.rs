use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http;
use crate::core::verify::HashVerifier;

/// A check that must pass right before an artifact's download starts.
#[async_trait]
pub trait PreDownloadCheck: Send + Sync + fmt::Debug {
    async fn check(&self) -> LauncherResult<()>;
}

/// One file that must exist locally before launch.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// `None` means the file must already be on disk.
    pub url: Option<String>,
    pub path: PathBuf,
    pub verifier: Option<HashVerifier>,
    pub gate: Option<Arc<dyn PreDownloadCheck>>,
    pub friendly_name: String,
}

impl Artifact {
    pub fn local(path: PathBuf, friendly_name: impl Into<String>) -> Self {
        Self {
            url: None,
            path,
            verifier: None,
            gate: None,
            friendly_name: friendly_name.into(),
        }
    }

    pub fn remote(
        url: impl Into<String>,
        path: PathBuf,
        verifier: Option<HashVerifier>,
        friendly_name: impl Into<String>,
    ) -> Self {
        Self {
            url: Some(url.into()),
            path,
            verifier,
            gate: None,
            friendly_name: friendly_name.into(),
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn PreDownloadCheck>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Sibling file a download is written to before the final rename.
    pub fn temp_path(&self) -> PathBuf {
        temp_path_for(&self.path)
    }
}

pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// What one source contributes to the launch.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub artifacts: Vec<Artifact>,
    /// Entry point class, if this source decides it.
    pub main_class: Option<String>,
}

// ── Auth token gate ─────────────────────────────────────

pub const AUTH_VALIDATE_URL: &str = "https://authserver.mojang.com/validate";

/// Validates the session token before the game jar may be fetched.
#[derive(Debug, Clone)]
pub struct AuthTokenCheck {
    client: reqwest::Client,
    validate_url: String,
    access_token: Option<String>,
    artifact: String,
}

impl AuthTokenCheck {
    pub fn new(
        client: reqwest::Client,
        validate_url: impl Into<String>,
        access_token: Option<String>,
        artifact: impl Into<String>,
    ) -> Self {
        Self {
            client,
            validate_url: validate_url.into(),
            access_token,
            artifact: artifact.into(),
        }
    }

    fn fail(&self, reason: &str) -> LauncherError {
        LauncherError::PreDownloadCheck {
            artifact: self.artifact.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl PreDownloadCheck for AuthTokenCheck {
    async fn check(&self) -> LauncherResult<()> {
        let Some(token) = &self.access_token else {
            return Err(self.fail(
                "No access token was provided, please go online to download the Minecraft JAR!",
            ));
        };

        let body = serde_json::json!({ "accessToken": token });
        match http::post_json_for_status(&self.client, &self.validate_url, &body).await {
            Ok(200) | Ok(204) => {
                debug!("Access token validated for {}", self.artifact);
                Ok(())
            }
            Ok(_) => Err(self.fail(
                "Authentication token is invalid, please go online to download the Minecraft JAR!",
            )),
            Err(e) => {
                debug!("Auth validation request failed: {}", e);
                Err(self.fail(
                    "Failed to check authentication, please go online to download the Minecraft JAR!",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::build_http_client;

    #[test]
    fn temp_path_is_a_sibling() {
        let artifact = Artifact::local(PathBuf::from("/libs/a/b-1.0.jar"), "b");
        assert_eq!(artifact.temp_path(), PathBuf::from("/libs/a/b-1.0.jar.tmp"));
    }

    async fn check_with_status(status: usize, token: Option<&str>) -> LauncherResult<()> {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/validate")
            .match_body(mockito::Matcher::Json(serde_json::json!({"accessToken": "tok"})))
            .with_status(status)
            .create_async()
            .await;

        AuthTokenCheck::new(
            build_http_client().unwrap(),
            format!("{}/validate", server.url()),
            token.map(Into::into),
            "Minecraft client 1.20",
        )
        .check()
        .await
    }

    #[tokio::test]
    async fn accepted_token_passes() {
        assert!(check_with_status(204, Some("tok")).await.is_ok());
        assert!(check_with_status(200, Some("tok")).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_token_fails_with_reason() {
        match check_with_status(403, Some("tok")).await {
            Err(LauncherError::PreDownloadCheck { artifact, reason }) => {
                assert_eq!(artifact, "Minecraft client 1.20");
                assert!(reason.contains("invalid"));
            }
            other => panic!("expected gate failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_token_fails_without_a_request() {
        let err = check_with_status(204, None).await.unwrap_err();
        assert!(matches!(err, LauncherError::PreDownloadCheck { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_gate_failure() {
        let check = AuthTokenCheck::new(
            build_http_client().unwrap(),
            "http://127.0.0.1:1/validate",
            Some("tok".into()),
            "Minecraft client 1.20",
        );
        match check.check().await {
            Err(LauncherError::PreDownloadCheck { reason, .. }) => {
                assert!(reason.contains("Failed to check authentication"))
            }
            other => panic!("expected gate failure, got {other:?}"),
        }
    }
}
