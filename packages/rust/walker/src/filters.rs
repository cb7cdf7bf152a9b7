//! Fixed skip rules applied during the tree walk.
//!
//! Three fixed sets plus a flag-gated one, applied in order: extension
//! allow-list, test-path patterns (unless tests are included), exclusion
//! patterns, then the post-fetch size ceiling checked by the engine.

use std::sync::LazyLock;

use regex::Regex;

/// Directory names pruned from the walk, compared case-insensitively:
/// version-control metadata, dependency caches, build output, editor
/// configuration, coverage reports.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    ".github",
    ".vscode",
    ".idea",
    "node_modules",
    "vendor",
    "dist",
    "build",
    "out",
    "bin",
    "obj",
    "__pycache__",
    "coverage",
];

/// Extensions considered source code.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    ".js", ".ts", ".jsx", ".tsx", ".py", ".java", ".kt", ".go", ".rb", ".php", ".cs", ".swift",
    ".m", ".h", ".c", ".cpp", ".hpp", ".dart",
];

/// Path markers indicating test or spec files: directory markers and
/// filename markers.
pub const TEST_PATH_MARKERS: &[&str] = &[
    "/test/",
    "/tests/",
    "/__tests__/",
    "/spec/",
    "test_",
    "_test.",
    ".test.",
    ".spec.",
];

/// Paths excluded regardless of extension: minified assets, media,
/// documents/archives, lock files, logs, maps.
static SKIP_FILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\.min\.js$",
        r"\.min\.css$",
        r"(?i)\.(png|jpg|jpeg|gif|bmp|ico|svg|mp4|mov|avi|wav|mp3|ogg)$",
        r"(?i)\.(pdf|docx?|xlsx?|pptx?|zip|tar|gz|rar)$",
        r"package-lock\.json$",
        r"yarn\.lock$",
        r"\.log$",
        r"\.cache$",
        r"\.map$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("skip pattern compiles"))
    .collect()
});

/// Whether a directory name is pruned from the walk.
pub fn is_skipped_dir(name: &str) -> bool {
    let lowered = name.to_lowercase();
    SKIP_DIRS.contains(&lowered.as_str())
}

/// Whether the filename carries a source-code extension.
pub fn has_source_extension(name: &str) -> bool {
    match name.rfind('.') {
        Some(idx) => {
            let ext = name[idx..].to_lowercase();
            SOURCE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Whether a path looks like a test or spec file.
pub fn is_test_path(path: &str) -> bool {
    TEST_PATH_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Whether a path matches the fixed exclusion patterns.
pub fn is_excluded_path(path: &str) -> bool {
    SKIP_FILE_PATTERNS.iter().any(|pattern| pattern.is_match(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_dirs_are_case_insensitive() {
        assert!(is_skipped_dir("node_modules"));
        assert!(is_skipped_dir("Node_Modules"));
        assert!(is_skipped_dir(".GIT"));
        assert!(!is_skipped_dir("src"));
        assert!(!is_skipped_dir("lib"));
    }

    #[test]
    fn source_extensions_cover_common_languages() {
        assert!(has_source_extension("app.js"));
        assert!(has_source_extension("main.PY"));
        assert!(has_source_extension("handler.go"));
        assert!(has_source_extension("widget.dart"));
        assert!(!has_source_extension("README.md"));
        assert!(!has_source_extension("data.json"));
        assert!(!has_source_extension("Makefile"));
    }

    #[test]
    fn test_markers_match_directories_and_filenames() {
        assert!(is_test_path("src/__tests__/app.js"));
        assert!(is_test_path("packages/a/test/util.ts"));
        assert!(is_test_path("src/app.test.js"));
        assert!(is_test_path("src/app.spec.ts"));
        assert!(is_test_path("src/test_helpers.py"));
        assert!(!is_test_path("src/app.js"));
        assert!(!is_test_path("src/contest.js"));
    }

    #[test]
    fn exclusion_patterns_match_artifacts() {
        assert!(is_excluded_path("dist/app.min.js"));
        assert!(is_excluded_path("assets/logo.PNG"));
        assert!(is_excluded_path("docs/manual.pdf"));
        assert!(is_excluded_path("package-lock.json"));
        assert!(is_excluded_path("server.log"));
        assert!(is_excluded_path("bundle.js.map"));
        assert!(!is_excluded_path("src/app.js"));
    }
}
