//! Synthesis orchestration: prompt → completion call → repair → parse.

use tracing::{info, instrument, warn};

use repodocs_shared::{
    CompletionConfig, FileEntry, GeneratedDocs, RepoMetadata, RepodocsError, Result,
};

use crate::client::{CompletionClient, GenerationParams};
use crate::prompt::build_prompt;
use crate::repair::{parse, repair};

/// Turns harvested files plus repository metadata into a structured
/// document via the completion collaborator.
pub struct DocSynthesizer<'a> {
    client: &'a dyn CompletionClient,
    config: &'a CompletionConfig,
}

impl<'a> DocSynthesizer<'a> {
    pub fn new(client: &'a dyn CompletionClient, config: &'a CompletionConfig) -> Self {
        Self { client, config }
    }

    /// Build the bounded prompt, invoke the collaborator, and coerce its
    /// output into a document.
    #[instrument(skip_all, fields(files = files.len(), repo = %metadata.full_name))]
    pub async fn generate(
        &self,
        files: &[FileEntry],
        metadata: &RepoMetadata,
    ) -> Result<GeneratedDocs> {
        let prompt = build_prompt(files, metadata);
        let params = GenerationParams::default();

        let response = self
            .client
            .complete(&prompt, &self.config.model, &params)
            .await?;

        let raw = match response {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                return Err(RepodocsError::synthesis(
                    "completion service returned empty response",
                ));
            }
        };

        let repaired = repair(&raw);
        if repaired != raw.trim() {
            warn!("completion response required repair before parsing");
        }

        let documentation = parse(repaired)?;
        info!("documentation synthesized");

        Ok(GeneratedDocs { documentation })
    }
}
