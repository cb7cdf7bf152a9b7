//! Bounded prompt construction for the synthesis call.

use repodocs_shared::{FileEntry, RepoMetadata};

/// At most this many harvested files are embedded, in walk order.
pub const MAX_PROMPT_FILES: usize = 20;

/// Per-file content ceiling in characters; longer content is cut and
/// marked.
pub const MAX_FILE_CHARS: usize = 3_000;

/// Marker appended to content cut at the ceiling.
const TRUNCATION_MARKER: &str = "\n... [TRUNCATED]";

/// The exact document schema the completion service is instructed to
/// return.
const DOCUMENT_SCHEMA: &str = r#"{
  "title": "Project Name",
  "description": "One-line description",
  "tagline": "Catchy tagline",
  "badges": [
    { "label": "Build", "status": "passing", "color": "brightgreen" },
    { "label": "Version", "status": "1.0.0", "color": "blue" }
  ],
  "features": [
    "Feature 1 description",
    "Feature 2 description"
  ],
  "techStack": [
    { "name": "Node.js", "icon": "nodejs" },
    { "name": "Express", "icon": "express" }
  ],
  "installation": {
    "requirements": ["Node.js 14+", "npm or yarn"],
    "steps": [
      "Clone the repository",
      "Install dependencies: npm install",
      "Configure environment variables",
      "Start the server: npm start"
    ]
  },
  "usage": {
    "basic": "Basic usage example code",
    "advanced": "Advanced usage example code"
  },
  "api": [
    {
      "endpoint": "/api/endpoint",
      "method": "POST",
      "description": "Description",
      "parameters": [
        { "name": "param1", "type": "string", "required": true }
      ],
      "example": "curl example"
    }
  ],
  "fileStructure": [
    { "path": "src/", "description": "Source code directory" },
    { "path": "config/", "description": "Configuration files" }
  ],
  "contributing": {
    "setup": "Development setup instructions",
    "guidelines": "Code style guidelines",
    "process": "Pull request process"
  },
  "license": "MIT",
  "author": "Author name",
  "bestPractices": {
    "score": 85,
    "summary": "Brief summary of adherence to best practices",
    "strengths": [
      "List of strengths in following best practices"
    ],
    "improvements": [
      {
        "category": "Testing",
        "suggestions": [
          "Add unit tests for core modules",
          "Implement integration testing"
        ]
      },
      {
        "category": "Security",
        "suggestions": [
          "Sanitize user inputs in API endpoints",
          "Implement rate limiting"
        ]
      }
    ]
  }
}"#;

/// Build the instruction prompt from harvested files and repository
/// metadata.
pub fn build_prompt(files: &[FileEntry], metadata: &RepoMetadata) -> String {
    let code_context: String = files
        .iter()
        .take(MAX_PROMPT_FILES)
        .map(|file| {
            format!(
                "\n\n### FILE: {}\n```\n{}\n```",
                file.path,
                truncate_content(&file.content, MAX_FILE_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert technical documentation analyzer. Analyze the repository: {full_name}\n\
         \n\
         REPOSITORY METADATA:\n\
         - Description: {description}\n\
         - Primary language: {language}\n\
         - Created: {created}\n\
         - Last updated: {updated}\n\
         \n\
         ANALYZE THE CODE AND RETURN A JSON OBJECT WITH THIS EXACT STRUCTURE:\n\
         {schema}\n\
         \n\
         CODE CONTEXT:\n\
         {code_context}\n\
         \n\
         IMPORTANT: Return ONLY a complete, valid JSON object. No markdown, no explanations.\n\
         IMPORTANT: Close every bracket and brace and escape special characters inside strings.\n\
         IMPORTANT: For best practices Keep the response phrases as short as possible.",
        full_name = metadata.full_name,
        description = metadata.description.as_deref().unwrap_or("N/A"),
        language = metadata.language.as_deref().unwrap_or("Multiple"),
        created = metadata.created_at.format("%Y-%m-%d"),
        updated = metadata.updated_at.format("%Y-%m-%d"),
        schema = DOCUMENT_SCHEMA,
        code_context = code_context,
    )
}

/// Cut content at `max_chars` characters, appending the truncation marker
/// when cut.
fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &content[..byte_idx]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metadata() -> RepoMetadata {
        RepoMetadata {
            full_name: "octocat/hello-world".into(),
            description: Some("My first repository".into()),
            language: Some("JavaScript".into()),
            default_branch: "main".into(),
            created_at: chrono::Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            updated_at: chrono::Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn entry(path: &str, content: &str) -> FileEntry {
        FileEntry {
            path: path.into(),
            relative_path: path.into(),
            content: content.into(),
            size: content.len() as u64,
            sha: "sha".into(),
        }
    }

    #[test]
    fn embeds_metadata_and_schema() {
        let prompt = build_prompt(&[entry("src/app.js", "const x = 1;")], &metadata());
        assert!(prompt.contains("Analyze the repository: octocat/hello-world"));
        assert!(prompt.contains("- Description: My first repository"));
        assert!(prompt.contains("- Primary language: JavaScript"));
        assert!(prompt.contains("- Created: 2020-01-01"));
        assert!(prompt.contains(r#""bestPractices""#));
        assert!(prompt.contains("### FILE: src/app.js"));
    }

    #[test]
    fn missing_metadata_gets_placeholders() {
        let mut meta = metadata();
        meta.description = None;
        meta.language = None;
        let prompt = build_prompt(&[], &meta);
        assert!(prompt.contains("- Description: N/A"));
        assert!(prompt.contains("- Primary language: Multiple"));
    }

    #[test]
    fn caps_embedded_files_at_twenty() {
        let files: Vec<FileEntry> = (0..25)
            .map(|i| entry(&format!("src/f{i}.js"), "x"))
            .collect();
        let prompt = build_prompt(&files, &metadata());
        assert_eq!(prompt.matches("### FILE:").count(), MAX_PROMPT_FILES);
        // Walk order is preserved: the first file is in, the last is not.
        assert!(prompt.contains("### FILE: src/f0.js"));
        assert!(!prompt.contains("### FILE: src/f24.js"));
    }

    #[test]
    fn truncates_long_content_with_marker() {
        let long = "a".repeat(5_000);
        let prompt = build_prompt(&[entry("big.js", &long)], &metadata());
        assert!(prompt.contains("... [TRUNCATED]"));
        // Short content is embedded untouched.
        let short_prompt = build_prompt(&[entry("small.js", "tiny")], &metadata());
        assert!(!short_prompt.contains("... [TRUNCATED]"));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "é".repeat(MAX_FILE_CHARS + 1);
        let truncated = truncate_content(&long, MAX_FILE_CHARS);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            truncated.trim_end_matches(TRUNCATION_MARKER).chars().count(),
            MAX_FILE_CHARS
        );
    }
}
