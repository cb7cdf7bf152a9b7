//! End-to-end generation pipeline: metadata → tree walk → synthesis.
//!
//! This is the unit of work the coordinator coalesces. Milestone progress
//! percentages frame the walk's reserved 30–50% band; the walk and the
//! synthesis report through the same per-job channel.

use tracing::{info, instrument};

use repodocs_github::RepoSource;
use repodocs_jobs::ProgressBus;
use repodocs_shared::{AppConfig, GeneratedDocs, JobId, ProgressEvent, Result};
use repodocs_synth::{CompletionClient, DocSynthesizer};
use repodocs_walker::{TreeWalker, WalkProgress};

/// Run one generation and report progress on the job's channel.
///
/// On failure a terminal `-1` progress event carrying the error message
/// is emitted before the error propagates to the coordinator.
pub async fn generate_docs(
    config: &AppConfig,
    source: &dyn RepoSource,
    completion: &dyn CompletionClient,
    include_tests: bool,
    job_id: &JobId,
    bus: &ProgressBus<GeneratedDocs>,
) -> Result<GeneratedDocs> {
    match run_pipeline(config, source, completion, include_tests, job_id, bus).await {
        Ok(docs) => Ok(docs),
        Err(err) => {
            bus.publish_progress(job_id, ProgressEvent::new(Some(-1), format!("Error: {err}")));
            Err(err)
        }
    }
}

#[instrument(skip_all, fields(%job_id, include_tests))]
async fn run_pipeline(
    config: &AppConfig,
    source: &dyn RepoSource,
    completion: &dyn CompletionClient,
    include_tests: bool,
    job_id: &JobId,
    bus: &ProgressBus<GeneratedDocs>,
) -> Result<GeneratedDocs> {
    let emit = |progress: i8, message: &str| {
        bus.publish_progress(job_id, ProgressEvent::new(Some(progress), message));
    };

    emit(5, "Starting documentation generation...");

    emit(10, "Fetching repository metadata...");
    let metadata = source.repo_metadata().await?;

    emit(20, "Discovering repository structure...");
    let root = source.list("").await?;

    emit(30, "Starting file analysis...");
    let sink = BusWalkSink { bus, job_id };
    let walker = TreeWalker::new(source, include_tests, &sink);
    let files = walker.harvest(root, "").await;
    info!(files = files.len(), "tree walk complete");

    emit(60, "Generating documentation with AI...");
    let synthesizer = DocSynthesizer::new(completion, &config.completion);
    let docs = synthesizer.generate(&files, &metadata).await?;

    emit(90, "Documentation generated successfully!");
    emit(100, "Documentation ready");

    Ok(docs)
}

/// Forwards walk progress onto the job's channel.
struct BusWalkSink<'a> {
    bus: &'a ProgressBus<GeneratedDocs>,
    job_id: &'a JobId,
}

impl WalkProgress for BusWalkSink<'_> {
    fn event(&self, event: ProgressEvent) {
        self.bus.publish_progress(self.job_id, event);
    }
}
