//! Per-component error taxonomy (spec.md §7). Each component gets its own
//! enum so callers can match on recoverability without unwrapping a single
//! catch-all type; `EngineError` aggregates them for call sites that don't
//! need the distinction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("multi-vector has zero tokens")]
    CorruptEmbedding,
    #[error("embedding exceeds maximum encodable size ({0} bytes)")]
    EmbeddingTooLarge(usize),
    #[error("unsupported codec version tag {0}")]
    UnsupportedCodec(u8),
    #[error("truncated or malformed codec payload")]
    Truncated,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("key '{0}' is reserved")]
    ReservedKey(String),
    #[error("key '{0}' must be scalar, got a nested container")]
    NestedContainer(String),
    #[error("metadata size {actual} bytes exceeds limit {limit} bytes")]
    TooLarge { actual: usize, limit: usize },
    #[error("missing required key '{0}'")]
    MissingRequiredKey(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out")]
    Timeout,
    #[error("record '{0}' not found")]
    NotFound(String),
    #[error("collection index is corrupt: {0}")]
    CorruptIndex(String),
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("dimension mismatch: query={query}, document={document}")]
    DimMismatch { query: u32, document: u32 },
    #[error("non-finite value produced during scoring")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,
    #[error("query exceeds maximum length of {0} characters")]
    TooLong(usize),
    #[error("embedding capability failed: {0}")]
    EmbeddingFailure(String),
}

/// Failure classification for ingest (spec.md §7): `Transient` is
/// retriable by the caller, `Permanent` is not, `Partial` means the
/// document still completed but with degraded coverage.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document already ingested and unchanged")]
    AlreadyIngested,
    #[error("parser returned zero pages and zero chunks")]
    EmptyParse,
    #[error("unsupported file extension '{0}'")]
    UnsupportedFormat(String),
    #[error("file exceeds maximum size of {0} MiB")]
    FileTooLarge(u64),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("permanent failure: {0}")]
    Permanent(String),
    #[error("ingest cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, IngestError::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("operation timed out after {0}ms")]
    Timeout(u64),
    #[error("operation cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
