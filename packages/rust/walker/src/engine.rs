//! Recursive, filtered harvest of a remote repository tree.
//!
//! Traversal is pre-order depth-first: children of one directory are
//! visited in listing order, and a subdirectory's contents are fully
//! drained before its siblings resume. Every remote call can fail
//! per-item without aborting the walk.

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use repodocs_github::{EntryKind, RepoEntry, RepoSource};
use repodocs_shared::{FileEntry, MAX_FILE_BYTES, ProgressEvent};

use crate::filters::{has_source_extension, is_excluded_path, is_skipped_dir, is_test_path};

/// Lower bound of the walk's reserved band on the whole job's progress
/// scale.
const WALK_BAND_START: i8 = 30;
/// Upper bound; computed percentages are capped here.
const WALK_BAND_END: i8 = 50;

/// Emit one batched "processed" event every this many harvested files.
const BATCH_EVERY: usize = 5;

// ---------------------------------------------------------------------------
// Progress sink
// ---------------------------------------------------------------------------

/// Sink for walk progress events.
pub trait WalkProgress: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

/// No-op sink for headless/test usage.
pub struct SilentWalk;

impl WalkProgress for SilentWalk {
    fn event(&self, _event: ProgressEvent) {}
}

// ---------------------------------------------------------------------------
// Walk state
// ---------------------------------------------------------------------------

/// Running counters shared across the recursion.
struct WalkState {
    /// Files fetched and decoded so far.
    processed: usize,
    /// Accumulated count of filter-passing files across visited listings.
    total: usize,
}

impl WalkState {
    /// Remap processed/total into the walk's reserved sub-range of the
    /// job's progress scale, capped at the band's upper bound.
    fn percent(&self) -> Option<i8> {
        if self.total == 0 {
            return None;
        }
        let scaled =
            (self.processed as f64 / self.total as f64 * 20.0).round() as i8 + WALK_BAND_START;
        Some(scaled.min(WALK_BAND_END))
    }
}

// ---------------------------------------------------------------------------
// TreeWalker
// ---------------------------------------------------------------------------

/// Filtered harvester over a [`RepoSource`] tree.
pub struct TreeWalker<'a> {
    source: &'a dyn RepoSource,
    include_tests: bool,
    progress: &'a dyn WalkProgress,
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        source: &'a dyn RepoSource,
        include_tests: bool,
        progress: &'a dyn WalkProgress,
    ) -> Self {
        Self {
            source,
            include_tests,
            progress,
        }
    }

    /// Harvest all passing files reachable from `entries`, a directory
    /// listing rooted at `base_path` (`""` for the repository root).
    pub async fn harvest(&self, entries: Vec<RepoEntry>, base_path: &str) -> Vec<FileEntry> {
        let mut state = WalkState {
            processed: 0,
            total: 0,
        };
        let files = self
            .process(entries, base_path.to_string(), &mut state)
            .await;
        debug!(
            harvested = files.len(),
            counted = state.total,
            "tree walk finished"
        );
        files
    }

    fn process<'s>(
        &'s self,
        entries: Vec<RepoEntry>,
        base_path: String,
        state: &'s mut WalkState,
    ) -> BoxFuture<'s, Vec<FileEntry>> {
        async move {
            state.total += entries
                .iter()
                .filter(|entry| {
                    entry.kind == EntryKind::File && self.passes_name_filters(&entry.path, &entry.name)
                })
                .count();

            let mut results = Vec::new();

            for entry in entries {
                let relative = relative_path(&entry.path, &base_path);
                match entry.kind {
                    EntryKind::Dir => {
                        if is_skipped_dir(&entry.name) {
                            self.emit(None, format!("Skipped directory: {relative}"), None);
                            continue;
                        }
                        self.emit(None, format!("Scanning directory: {relative}"), None);

                        match self.source.list(&entry.path).await {
                            Ok(children) => {
                                let nested = self
                                    .process(children, entry.path.clone(), &mut *state)
                                    .await;
                                results.extend(nested);
                            }
                            Err(err) => {
                                warn!(path = %entry.path, error = %err, "directory listing failed");
                                self.emit(None, format!("Error processing: {relative}"), None);
                            }
                        }
                    }
                    EntryKind::File => {
                        if let Some(file) = self.process_file(&entry, &relative, state).await {
                            results.push(file);
                        }
                    }
                    EntryKind::Other => {
                        // Symlinks and submodules are neither entered nor counted.
                    }
                }
            }

            results
        }
        .boxed()
    }

    /// Apply the file filters in order, fetch, decode. Returns `None` for
    /// anything filtered or failed; failures never abort the walk.
    async fn process_file(
        &self,
        entry: &RepoEntry,
        relative: &str,
        state: &mut WalkState,
    ) -> Option<FileEntry> {
        if !has_source_extension(&entry.name) {
            self.emit(None, format!("Skipped non-source file: {relative}"), None);
            return None;
        }
        if !self.include_tests && is_test_path(&entry.path) {
            self.emit(None, format!("Skipped test file: {relative}"), None);
            return None;
        }
        if is_excluded_path(&entry.path) {
            self.emit(None, format!("Skipped file: {relative}"), None);
            return None;
        }

        let percent = state.percent();
        self.emit(
            percent,
            format!("Analyzing file: {relative}"),
            Some(relative.to_string()),
        );

        let content = match self.source.content(&entry.path).await {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %entry.path, error = %err, "content fetch failed");
                self.emit(None, format!("Error processing: {relative}"), None);
                return None;
            }
        };

        // Oversized files are skipped entirely, never truncated.
        if content.size > MAX_FILE_BYTES {
            self.emit(percent, format!("Skipped large file: {relative}"), None);
            return None;
        }

        let text = match content.decoded_text() {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %entry.path, error = %err, "content decode failed");
                self.emit(None, format!("Error processing: {relative}"), None);
                return None;
            }
        };

        state.processed += 1;
        if state.processed % BATCH_EVERY == 0 {
            self.emit(
                state.percent(),
                format!("Processed {} files...", state.processed),
                None,
            );
        }

        Some(FileEntry {
            path: entry.path.clone(),
            relative_path: relative.to_string(),
            content: text,
            size: content.size,
            sha: content.sha,
        })
    }

    fn passes_name_filters(&self, path: &str, name: &str) -> bool {
        has_source_extension(name)
            && (self.include_tests || !is_test_path(path))
            && !is_excluded_path(path)
    }

    fn emit(&self, progress: Option<i8>, message: String, current_file: Option<String>) {
        let mut event = ProgressEvent::new(progress, message);
        event.current_file = current_file;
        self.progress.event(event);
    }
}

/// Path of `full` relative to its parent listing.
fn relative_path(full: &str, base: &str) -> String {
    if base.is_empty() {
        full.to_string()
    } else {
        full.strip_prefix(&format!("{base}/"))
            .unwrap_or(full)
            .to_string()
    }
}
