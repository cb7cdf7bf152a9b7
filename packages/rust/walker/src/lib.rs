//! Recursive, filtered harvester of remote repository trees.
//!
//! Applies fixed skip rules (pruned directories, source-extension
//! allow-list, test-path gating, artifact exclusions, size ceiling) while
//! walking a [`repodocs_github::RepoSource`] pre-order depth-first, and
//! reports throttled progress through a pluggable sink.

pub mod engine;
pub mod filters;

pub use engine::{SilentWalk, TreeWalker, WalkProgress};
