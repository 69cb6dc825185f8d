//! Error types for the pipeline.
//!
//! Each external concern gets its own enum so stages can classify
//! failures: transient errors are retried (fetch only), deterministic
//! rejections are recorded per item, and everything else surfaces as a
//! stage failure that the router turns into a `workflow.error` event.

use thiserror::Error;

/// Trace state store errors. A store failure is fatal to the invoking
/// stage and propagates as a workflow error, never silently swallowed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("schema mismatch for {key}: expected {expected} v{expected_version}, found {found} v{found_version}")]
    SchemaMismatch {
        key: String,
        expected: String,
        expected_version: u32,
        found: String,
        found_version: u32,
    },
}

/// Web search API errors.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized - check search API key")]
    Unauthorized,

    #[error("rate limited by search provider")]
    RateLimited,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("search server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("unexpected HTTP status ({0}): {1}")]
    HttpStatus(u16, String),

    #[error("failed to parse search response: {0}")]
    Parse(String),
}

/// Per-URL fetch/extract errors.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("unsupported content type: {0}")]
    ContentType(String),

    #[error("no content extracted")]
    NoContent,
}

impl FetchError {
    /// Transient transport failures are retried with a fixed delay.
    /// Non-2xx statuses and content-type mismatches are deterministic
    /// rejections and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout | FetchError::Connection(_) | FetchError::Transport(_)
        )
    }
}

/// Completion service errors.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("completion request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("completion HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("completion returned empty content")]
    EmptyResponse,

    #[error("completion output has invalid shape: {0}")]
    InvalidShape(String),
}

/// Stage-level failures. The router converts these into
/// `workflow.error` events; a failing stage never takes down its
/// sibling subscribers.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("required artifact missing: {0}")]
    MissingArtifact(String),

    #[error("stage received unexpected event: {0}")]
    UnexpectedEvent(String),

    #[error("batch produced zero usable results: {0}")]
    EmptyBatch(String),
}
