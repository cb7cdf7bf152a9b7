//! GitHub REST implementation of [`RepoSource`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use repodocs_shared::{GithubConfig, RepoMetadata, RepodocsError, Result, UpstreamKind};

use crate::{RepoContent, RepoEntry, RepoSource};

/// User-Agent string for API requests (GitHub rejects anonymous agents).
const USER_AGENT: &str = concat!("repodocs/", env!("CARGO_PKG_VERSION"));

/// GitHub contents-API client scoped to one repository and credential.
pub struct GithubClient {
    http: Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl GithubClient {
    /// Build a client for one (owner, repo, credential) triple.
    pub fn new(
        config: &GithubConfig,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RepodocsError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let base = format!(
            "{}/repos/{}/{}/contents",
            self.api_base, self.owner, self.repo
        );
        if path.is_empty() {
            base
        } else {
            format!("{base}/{path}")
        }
    }

    async fn get_json<D: serde::de::DeserializeOwned>(&self, url: &str) -> Result<D> {
        debug!(%url, "github request");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| RepodocsError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &format!("{url}: {body}")));
        }

        response
            .json::<D>()
            .await
            .map_err(|e| RepodocsError::Network(format!("{url}: invalid response body: {e}")))
    }
}

/// Map an upstream status to a coarse error class. None of these are
/// retried automatically.
fn map_status(status: StatusCode, message: &str) -> RepodocsError {
    let kind = match status {
        StatusCode::NOT_FOUND => UpstreamKind::NotFound,
        StatusCode::UNAUTHORIZED => UpstreamKind::Unauthorized,
        StatusCode::FORBIDDEN => UpstreamKind::Forbidden,
        StatusCode::TOO_MANY_REQUESTS => UpstreamKind::RateLimited,
        other => UpstreamKind::Other(other.as_u16()),
    };
    RepodocsError::upstream(kind, message)
}

#[async_trait]
impl RepoSource for GithubClient {
    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn repo_metadata(&self) -> Result<RepoMetadata> {
        let url = format!("{}/repos/{}/{}", self.api_base, self.owner, self.repo);
        self.get_json(&url).await
    }

    async fn list(&self, path: &str) -> Result<Vec<RepoEntry>> {
        self.get_json(&self.contents_url(path)).await
    }

    async fn content(&self, path: &str) -> Result<RepoContent> {
        self.get_json(&self.contents_url(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntryKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> GithubConfig {
        GithubConfig {
            api_base: server.uri(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn fetches_repo_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/hello-world"))
            .and(header("Authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "full_name": "octocat/hello-world",
                "description": "My first repository",
                "language": "JavaScript",
                "default_branch": "main",
                "created_at": "2020-01-01T00:00:00Z",
                "updated_at": "2024-06-01T12:00:00Z",
            })))
            .mount(&server)
            .await;

        let client =
            GithubClient::new(&test_config(&server), "octocat", "hello-world", "ghp_test")
                .expect("client");
        let meta = client.repo_metadata().await.expect("metadata");

        assert_eq!(meta.full_name, "octocat/hello-world");
        assert_eq!(meta.language.as_deref(), Some("JavaScript"));
        assert_eq!(meta.default_branch, "main");
    }

    #[tokio::test]
    async fn lists_root_and_nested_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/hello-world/contents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "src", "path": "src", "type": "dir"},
                {"name": "README.md", "path": "README.md", "type": "file"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/hello-world/contents/src"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "app.js", "path": "src/app.js", "type": "file"},
            ])))
            .mount(&server)
            .await;

        let client =
            GithubClient::new(&test_config(&server), "octocat", "hello-world", "ghp_test")
                .expect("client");

        let root = client.list("").await.expect("root listing");
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].kind, EntryKind::Dir);

        let nested = client.list("src").await.expect("nested listing");
        assert_eq!(nested[0].path, "src/app.js");
    }

    #[tokio::test]
    async fn fetches_and_decodes_content() {
        let server = MockServer::start().await;
        // "console.log('hi');" base64-encoded with a line break, as GitHub
        // returns it.
        Mock::given(method("GET"))
            .and(path("/repos/octocat/hello-world/contents/src/app.js"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": "Y29uc29sZS5sb2co\nJ2hpJyk7\n",
                "encoding": "base64",
                "size": 18,
                "sha": "deadbeef",
            })))
            .mount(&server)
            .await;

        let client =
            GithubClient::new(&test_config(&server), "octocat", "hello-world", "ghp_test")
                .expect("client");
        let content = client.content("src/app.js").await.expect("content");

        assert_eq!(content.size, 18);
        assert_eq!(content.decoded_text().expect("decode"), "console.log('hi');");
    }

    #[tokio::test]
    async fn maps_upstream_status_classes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/secret"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = test_config(&server);

        let gone = GithubClient::new(&config, "octocat", "gone", "ghp_test").expect("client");
        match gone.repo_metadata().await.expect_err("must fail") {
            RepodocsError::Upstream { kind, .. } => assert_eq!(kind, UpstreamKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }

        let secret =
            GithubClient::new(&config, "octocat", "secret", "ghp_test").expect("client");
        match secret.repo_metadata().await.expect_err("must fail") {
            RepodocsError::Upstream { kind, .. } => {
                assert_eq!(kind, UpstreamKind::Unauthorized)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
