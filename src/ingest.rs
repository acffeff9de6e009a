//! IngestOrchestrator (spec.md §4.8): parses a source file, embeds its
//! pages/chunks, and writes the resulting records with idempotent replace
//! semantics. Grounded on `embedder.rs::index_workspace_vectors` (content
//! hash dedup, compute-what-changed) generalized from "one workspace" to
//! "one document," and on `odgrim-abathur-swarm`'s `backoff`-based retry
//! for the embed step (the teacher has no retry path of its own).

use std::sync::Arc;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::capability::{Embedder, Parser};
use crate::codec;
use crate::config::EngineConfig;
use crate::error::{EngineError, IngestError};
use crate::metadata;
use crate::status::Status;
use crate::types::{DocId, Document, DocumentStatus, Kind, Metadata, MultiVector, Record, RecordId, ReprRule};
use crate::vector_store::VectorStore;

pub struct IngestOptions {
    /// Explicit, caller-assigned document identity. When `None`, the
    /// document id is derived from a content hash of the raw bytes, so
    /// re-ingesting identical bytes is a no-op.
    pub doc_id: Option<DocId>,
    pub doc_meta: Metadata,
    /// When `true`, a `doc_id` already marked `Completed` is re-ingested
    /// instead of short-circuiting with `AlreadyIngested` (spec.md §4.8
    /// step 1, §6.2 `ingest(..., options{replace})`).
    pub replace: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            doc_id: None,
            doc_meta: Metadata::new(),
            replace: false,
        }
    }
}

pub struct IngestOrchestrator {
    store: Arc<VectorStore>,
    status: Arc<Status>,
    parser: Arc<dyn Parser>,
    embedder: Arc<dyn Embedder>,
    repr_rule: ReprRule,
    config: EngineConfig,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl IngestOrchestrator {
    pub fn new(
        store: Arc<VectorStore>,
        status: Arc<Status>,
        parser: Arc<dyn Parser>,
        embedder: Arc<dyn Embedder>,
        repr_rule: ReprRule,
        config: EngineConfig,
    ) -> Self {
        let workers = config.ingest_workers.max(1);
        Self {
            store,
            status,
            parser,
            embedder,
            repr_rule,
            config,
            semaphore: Arc::new(tokio::sync::Semaphore::new(workers)),
        }
    }

    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
        options: IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<Document, EngineError> {
        self.validate_intake(filename, bytes)?;
        metadata::validate(&options.doc_meta, self.config.max_metadata_bytes)?;

        let doc_id = options.doc_id.unwrap_or_else(|| DocId::from_content(bytes));

        if let Some(existing) = self.status.get(doc_id) {
            if existing.status == DocumentStatus::Completed && !options.replace {
                return Err(IngestError::AlreadyIngested.into());
            }
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EngineError::Internal("ingest semaphore closed".into()))?;

        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled.into());
        }

        self.status.create_queued(doc_id, filename.to_string());
        self.status
            .transition(doc_id, DocumentStatus::Processing, None)
            .map_err(EngineError::from)?;

        match self
            .run_pipeline(doc_id, filename, bytes, &options.doc_meta, cancel)
            .await
        {
            Ok((visual_count, text_count, warnings)) => {
                self.status.set_counts(doc_id, visual_count, text_count);
                for w in warnings {
                    self.status.add_warning(doc_id, w);
                }
                self.status
                    .transition(doc_id, DocumentStatus::Completed, None)
                    .map_err(EngineError::from)?;
            }
            Err(err) => {
                let retriable = matches!(&err, IngestError::Transient(_));
                self.status.set_retriable(doc_id, retriable);
                self.status
                    .transition(doc_id, DocumentStatus::Failed, Some(err.to_string()))
                    .map_err(EngineError::from)?;
                return Err(err.into());
            }
        }

        self.store.save()?;
        self.status.save()?;
        Ok(self.status.get(doc_id).expect("just wrote this document"))
    }

    fn validate_intake(&self, filename: &str, bytes: &[u8]) -> Result<(), IngestError> {
        let ext = filename
            .rsplit('.')
            .next()
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        if !self.config.allowed_extensions.iter().any(|a| a == &ext) {
            return Err(IngestError::UnsupportedFormat(ext));
        }
        let max_bytes = self.config.max_file_size_mb * 1024 * 1024;
        if bytes.len() as u64 > max_bytes {
            return Err(IngestError::FileTooLarge(self.config.max_file_size_mb));
        }
        Ok(())
    }

    /// Parses, embeds, and writes records for one document. Returns
    /// `(visual_count, text_count, warnings)` on success.
    async fn run_pipeline(
        &self,
        doc_id: DocId,
        filename: &str,
        bytes: &[u8],
        doc_meta: &Metadata,
        cancel: &CancellationToken,
    ) -> Result<(usize, usize, Vec<String>), IngestError> {
        let parsed = self.parse_with_retry(filename, bytes)?;
        if parsed.pages.is_empty() && parsed.chunks.is_empty() {
            return Err(IngestError::EmptyParse);
        }

        let old_ids = self.store.ids_for_document(&doc_id.to_string());

        let mut warnings = Vec::new();
        let mut new_records: Vec<Record> = Vec::new();

        for page in &parsed.pages {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            match self.embed_image_with_retry(&page.bytes) {
                Ok(mv) => {
                    let record_id = RecordId::visual(doc_id, page.page_index);
                    new_records.push(self.build_record(
                        record_id,
                        doc_id,
                        Kind::Visual,
                        page.page_index,
                        filename,
                        doc_meta,
                        None,
                        &mv,
                    )?);
                }
                Err(e) => warnings.push(format!("page {} failed to embed: {e}", page.page_index)),
            }
        }

        for chunk in &parsed.chunks {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            match self.embed_text_with_retry(&chunk.text) {
                Ok(mv) => {
                    let record_id = RecordId::text(doc_id, chunk.chunk_index);
                    new_records.push(self.build_record(
                        record_id,
                        doc_id,
                        Kind::Text,
                        chunk.chunk_index,
                        filename,
                        doc_meta,
                        Some(excerpt_of(&chunk.text)),
                        &mv,
                    )?);
                }
                Err(e) => warnings.push(format!(
                    "chunk {} failed to embed: {e}",
                    chunk.chunk_index
                )),
            }
        }

        if new_records.is_empty() {
            return Err(IngestError::Permanent(
                "every page/chunk failed to embed".to_string(),
            ));
        }

        let new_ids: std::collections::HashSet<RecordId> =
            new_records.iter().map(|r| r.id.clone()).collect();

        // Crash-safety contract: write every new-generation record before
        // deleting anything from the previous generation.
        self.store
            .put_all(new_records.clone())
            .map_err(|e| IngestError::Transient(e.to_string()))?;

        let stale: Vec<RecordId> = old_ids.into_iter().filter(|id| !new_ids.contains(id)).collect();
        let stale_visual: Vec<RecordId> = stale
            .iter()
            .filter(|id| id.as_str().contains(":v:"))
            .cloned()
            .collect();
        let stale_text: Vec<RecordId> = stale
            .iter()
            .filter(|id| id.as_str().contains(":t:"))
            .cloned()
            .collect();
        if !stale_visual.is_empty() {
            self.store
                .delete_records(Kind::Visual, &stale_visual)
                .map_err(|e| IngestError::Permanent(e.to_string()))?;
        }
        if !stale_text.is_empty() {
            self.store
                .delete_records(Kind::Text, &stale_text)
                .map_err(|e| IngestError::Permanent(e.to_string()))?;
        }

        let visual_count = new_records.iter().filter(|r| r.kind == Kind::Visual).count();
        let text_count = new_records.iter().filter(|r| r.kind == Kind::Text).count();
        Ok((visual_count, text_count, warnings))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record(
        &self,
        id: RecordId,
        doc_id: DocId,
        kind: Kind,
        ordinal: u32,
        filename: &str,
        doc_meta: &Metadata,
        excerpt: Option<String>,
        mv: &MultiVector,
    ) -> Result<Record, IngestError> {
        let representative = self.repr_rule.apply(mv);
        let full_compressed = codec::compress(mv).map_err(|e| IngestError::Permanent(e.to_string()))?;
        let metadata = metadata::with_system_fields(
            doc_meta.clone(),
            &doc_id.to_string(),
            kind,
            filename,
            ordinal,
            chrono::Utc::now(),
            excerpt.as_deref(),
        );
        Ok(Record {
            id,
            doc_id,
            kind,
            representative,
            full_compressed,
            metadata,
        })
    }

    fn parse_with_retry(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<crate::capability::ParsedDocument, IngestError> {
        let mut backoff = retry_policy();
        loop {
            match self.parser.parse(filename, bytes) {
                Ok(doc) => return Ok(doc),
                Err(crate::capability::ParseError::Malformed(m)) => {
                    return Err(IngestError::Permanent(m))
                }
                Err(crate::capability::ParseError::Unavailable(m)) => match backoff.next_backoff() {
                    Some(delay) => {
                        std::thread::sleep(delay);
                        continue;
                    }
                    None => return Err(IngestError::Transient(m)),
                },
            }
        }
    }

    fn embed_image_with_retry(&self, bytes: &[u8]) -> Result<MultiVector, IngestError> {
        let mut backoff = retry_policy();
        loop {
            match self.embedder.embed_image(bytes) {
                Ok(mv) => return Ok(mv),
                Err(crate::capability::EmbeddingError::InvalidInput(m)) => {
                    return Err(IngestError::Permanent(m))
                }
                Err(crate::capability::EmbeddingError::Unavailable(m)) => {
                    match backoff.next_backoff() {
                        Some(delay) => {
                            std::thread::sleep(delay);
                            continue;
                        }
                        None => {
                            warn!("embed_image exhausted retries: {m}");
                            return Err(IngestError::Transient(m));
                        }
                    }
                }
            }
        }
    }

    fn embed_text_with_retry(&self, text: &str) -> Result<MultiVector, IngestError> {
        let mut backoff = retry_policy();
        loop {
            match self.embedder.embed_text(text) {
                Ok(mv) => return Ok(mv),
                Err(crate::capability::EmbeddingError::InvalidInput(m)) => {
                    return Err(IngestError::Permanent(m))
                }
                Err(crate::capability::EmbeddingError::Unavailable(m)) => {
                    match backoff.next_backoff() {
                        Some(delay) => {
                            std::thread::sleep(delay);
                            continue;
                        }
                        None => {
                            warn!("embed_text exhausted retries: {m}");
                            return Err(IngestError::Transient(m));
                        }
                    }
                }
            }
        }
    }
}

/// Short excerpt of a text chunk, backing the result's `highlight` field
/// (spec.md §4.7). Truncates on a char boundary rather than a byte index.
fn excerpt_of(text: &str) -> String {
    const MAX_EXCERPT_CHARS: usize = 200;
    match text.char_indices().nth(MAX_EXCERPT_CHARS) {
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
        None => text.to_string(),
    }
}

fn retry_policy() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(20),
        max_interval: Duration::from_millis(200),
        max_elapsed_time: Some(Duration::from_millis(500)),
        ..Default::default()
    }
}
