//! Repository listing/content collaborator for repodocs.
//!
//! The [`RepoSource`] trait is the seam the tree walk is written against;
//! [`GithubClient`] is the production implementation over the GitHub
//! contents API. Tests and other hosts plug in their own implementors.

mod client;

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;

use repodocs_shared::{RepoMetadata, Result};

pub use client::GithubClient;

// ---------------------------------------------------------------------------
// Directory entries
// ---------------------------------------------------------------------------

/// Kind of a listed tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, submodules — anything the walk does not descend into.
    #[serde(other)]
    Other,
}

/// One child of a listed directory.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

// ---------------------------------------------------------------------------
// File content
// ---------------------------------------------------------------------------

/// Encoded file content as returned by the collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoContent {
    /// Base64 text, possibly broken across lines.
    pub content: String,
    /// Size in bytes of the decoded content.
    pub size: u64,
    /// Upstream content checksum.
    pub sha: String,
}

impl RepoContent {
    /// Decode the base64 payload to text. Line breaks inside the payload
    /// are tolerated; invalid UTF-8 sequences are replaced, not rejected.
    pub fn decoded_text(&self) -> Result<String> {
        let compact: String = self
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| {
                repodocs_shared::RepodocsError::Network(format!("invalid base64 content: {e}"))
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ---------------------------------------------------------------------------
// RepoSource trait
// ---------------------------------------------------------------------------

/// A remote file tree plus its repository metadata.
///
/// Implementors must support arbitrary path depth; `""` lists the root.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Repository metadata for the synthesis prompt.
    async fn repo_metadata(&self) -> Result<RepoMetadata>;

    /// List the children of a directory, in upstream listing order.
    async fn list(&self, path: &str) -> Result<Vec<RepoEntry>>;

    /// Fetch one file's encoded content.
    async fn content(&self, path: &str) -> Result<RepoContent>;
}
