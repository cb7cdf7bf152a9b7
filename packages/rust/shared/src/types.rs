//! Core domain types for repodocs generation jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hard ceiling on a single fetched file's size. Larger files are skipped
/// entirely, never truncated.
pub const MAX_FILE_BYTES: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Stable job identity derived from a request's (owner, repository,
/// credential) triple.
///
/// SHA-256 over the concatenated strings, lowercase hex. Identical triples
/// always map to the same id, so concurrent duplicate requests coalesce
/// onto one in-flight job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Derive the identity for a request triple.
    pub fn derive(owner: &str, repo: &str, credential: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(owner.as_bytes());
        hasher.update(repo.as_bytes());
        hasher.update(credential.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// A single status update on a job's progress channel.
///
/// `progress` is a percentage in `[-1, 100]`: `-1` marks terminal failure,
/// `100` terminal success, and `None` an informational update with no
/// percentage change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i8>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(progress: Option<i8>, message: impl Into<String>) -> Self {
        Self {
            progress,
            message: message.into(),
            current_file: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the file currently being analyzed.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.current_file = Some(file.into());
        self
    }

    /// True for the two terminal percentages.
    pub fn is_terminal(&self) -> bool {
        matches!(self.progress, Some(-1) | Some(100))
    }
}

// ---------------------------------------------------------------------------
// FileEntry
// ---------------------------------------------------------------------------

/// A harvested source file: produced once by the tree walk, immutable,
/// consumed once by the synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Full path within the repository tree.
    pub path: String,
    /// Path relative to the walk root.
    pub relative_path: String,
    /// Decoded UTF-8 text content.
    pub content: String,
    /// Size in bytes as reported by the content collaborator.
    pub size: u64,
    /// Content checksum as reported by the content collaborator.
    pub sha: String,
}

// ---------------------------------------------------------------------------
// RepoMetadata
// ---------------------------------------------------------------------------

/// Repository metadata embedded into the synthesis prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// GeneratedDocs
// ---------------------------------------------------------------------------

/// The settled outcome of a generation job.
///
/// The document schema is dictated by the synthesis prompt; it is kept as
/// a JSON value because the completion collaborator, not this crate, owns
/// the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocs {
    pub documentation: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_deterministic() {
        let a = JobId::derive("octocat", "hello-world", "ghp_token");
        let b = JobId::derive("octocat", "hello-world", "ghp_token");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn job_id_changes_with_any_component() {
        let base = JobId::derive("octocat", "hello-world", "ghp_token");
        assert_ne!(base, JobId::derive("octodog", "hello-world", "ghp_token"));
        assert_ne!(base, JobId::derive("octocat", "hello-mars", "ghp_token"));
        assert_ne!(base, JobId::derive("octocat", "hello-world", "ghp_other"));
    }

    #[test]
    fn progress_event_serializes_camel_case() {
        let event = ProgressEvent::new(Some(30), "Starting file analysis...")
            .with_file("src/app.js");
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains(r#""currentFile":"src/app.js""#));
        assert!(json.contains(r#""progress":30"#));
    }

    #[test]
    fn informational_event_omits_progress() {
        let event = ProgressEvent::new(None, "Skipped directory: node_modules");
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(!json.contains("progress"));
        assert!(!json.contains("currentFile"));
    }

    #[test]
    fn terminal_detection() {
        assert!(ProgressEvent::new(Some(100), "Documentation ready").is_terminal());
        assert!(ProgressEvent::new(Some(-1), "Error: boom").is_terminal());
        assert!(!ProgressEvent::new(Some(60), "Generating...").is_terminal());
        assert!(!ProgressEvent::new(None, "Scanning").is_terminal());
    }
}
