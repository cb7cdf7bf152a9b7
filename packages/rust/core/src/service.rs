//! Service facade: validation, job identity, and coalesced execution.
//!
//! One [`DocsService`] owns the process-wide channel registry and
//! in-flight job table. A generation request is exactly one call to the
//! coordinator, keyed by the identity derived from its triple.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::instrument;

use repodocs_github::GithubClient;
use repodocs_jobs::{JobCoordinator, ProgressBus};
use repodocs_shared::{AppConfig, GeneratedDocs, JobId, RepodocsError, Result};
use repodocs_synth::CompletionClient;

use crate::pipeline;

/// Owner/repository names accepted by the trigger.
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("name pattern compiles"));

const MAX_NAME_LEN: usize = 100;

/// A documentation-generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub owner: String,
    pub repo: String,
    pub token: String,
    pub include_tests: bool,
}

/// Coalescing documentation service.
pub struct DocsService {
    config: AppConfig,
    completion: Arc<dyn CompletionClient>,
    bus: Arc<ProgressBus<GeneratedDocs>>,
    coordinator: JobCoordinator<GeneratedDocs>,
}

impl DocsService {
    pub fn new(config: AppConfig, completion: Arc<dyn CompletionClient>) -> Self {
        let bus = Arc::new(ProgressBus::new());
        let coordinator = JobCoordinator::new(Arc::clone(&bus));
        Self {
            config,
            completion,
            bus,
            coordinator,
        }
    }

    /// The bus progress observers subscribe on.
    pub fn bus(&self) -> &Arc<ProgressBus<GeneratedDocs>> {
        &self.bus
    }

    /// Generate documentation for a repository, coalescing with any
    /// in-flight job for the same (owner, repo, credential) identity.
    #[instrument(skip_all, fields(owner = %request.owner, repo = %request.repo))]
    pub async fn generate(&self, request: GenerateRequest) -> Result<GeneratedDocs> {
        validate_request(&request)?;

        let job_id = JobId::derive(&request.owner, &request.repo, &request.token);
        let source = GithubClient::new(
            &self.config.github,
            &request.owner,
            &request.repo,
            &request.token,
        )?;

        let work_job_id = job_id.clone();
        let work = async {
            pipeline::generate_docs(
                &self.config,
                &source,
                self.completion.as_ref(),
                request.include_tests,
                &work_job_id,
                &self.bus,
            )
            .await
        };

        self.coordinator.start(job_id, work).await
    }
}

/// Reject malformed input before any external call or job creation.
fn validate_request(request: &GenerateRequest) -> Result<()> {
    validate_name("owner", &request.owner)?;
    validate_name("repo", &request.repo)?;
    if request.token.is_empty() {
        return Err(RepodocsError::validation("credential is required"));
    }
    Ok(())
}

fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(RepodocsError::validation(format!("{field} is required")));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(RepodocsError::validation(format!("{field} name too long")));
    }
    if !NAME_PATTERN.is_match(value) {
        return Err(RepodocsError::validation(format!(
            "invalid {field} name format"
        )));
    }
    Ok(())
}
