//! Error types for repodocs.
//!
//! Library crates use [`RepodocsError`] via `thiserror`.
//! App crates (cli/server) wrap this with `color-eyre` or map it to HTTP
//! statuses for rich diagnostics.
//!
//! The type is `Clone` on purpose: a coalesced job delivers the same
//! failure to its initiator and to every waiter attached mid-flight.

use std::path::PathBuf;

/// Coarse status class reported by the repository collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// Repository, path, or resource does not exist upstream.
    NotFound,
    /// Credential was rejected.
    Unauthorized,
    /// Credential is valid but lacks access.
    Forbidden,
    /// Upstream throttled the request.
    RateLimited,
    /// Any other non-success status.
    Other(u16),
}

impl std::fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::Other(status) => write!(f, "status {status}"),
        }
    }
}

/// Top-level error type for all repodocs operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepodocsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed input, rejected before any external call or job creation.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Network/HTTP transport error.
    #[error("network error: {0}")]
    Network(String),

    /// Mapped non-success response from the repository collaborator.
    #[error("upstream error ({kind}): {message}")]
    Upstream { kind: UpstreamKind, message: String },

    /// The completion collaborator returned nothing, or text that stayed
    /// unparseable after repair. Carries the repaired text for diagnostics.
    #[error("synthesis error: {message}")]
    Synthesis {
        message: String,
        repaired: Option<String>,
    },

    /// A waiter on a coalesced job gave up before the job settled.
    /// Distinct from the underlying job's own outcome.
    #[error("documentation generation timeout")]
    CoordinatorTimeout,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {message}")]
    Io { path: PathBuf, message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RepodocsError>;

impl RepodocsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an upstream error for a mapped status class.
    pub fn upstream(kind: UpstreamKind, msg: impl Into<String>) -> Self {
        Self::Upstream {
            kind,
            message: msg.into(),
        }
    }

    /// Create a synthesis error with no repaired text attached.
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis {
            message: msg.into(),
            repaired: None,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }
}
