//! Engine: composition root bundling `VectorStore`, `IngestOrchestrator`,
//! `SearchEngine`, and `Status` into one handle. Grounded on
//! `state.rs::AppState`, minus the WebSocket broadcast channel and the
//! HTTP-bound workspace/watcher managers this crate has no use for.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::capability::{Embedder, Parser};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ingest::{IngestOptions, IngestOrchestrator};
use crate::query::QueryProcessor;
use crate::search_engine::{SearchEngine, SearchRequest, SearchResponse};
use crate::status::Status;
use crate::types::{DeleteReport, Document};
use crate::vector_store::VectorStore;

pub struct Engine {
    pub config: EngineConfig,
    pub store: Arc<VectorStore>,
    pub status: Arc<Status>,
    pub search_engine: Arc<SearchEngine>,
    pub ingest_orchestrator: Arc<IngestOrchestrator>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
        parser: Arc<dyn Parser>,
    ) -> Result<Self, EngineError> {
        let data_dir = std::path::PathBuf::from(&config.data_dir);
        let store = Arc::new(VectorStore::open(config.deployment_dim, &data_dir)?);
        let status = Arc::new(Status::open(&data_dir)?);

        let query_processor = QueryProcessor::new(config.repr_rule);
        let search_engine = Arc::new(SearchEngine::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            query_processor,
            config.clone(),
        ));

        let ingest_orchestrator = Arc::new(IngestOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&status),
            parser,
            embedder,
            config.repr_rule,
            config.clone(),
        ));

        Ok(Self {
            config,
            store,
            status,
            search_engine,
            ingest_orchestrator,
        })
    }

    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
        options: IngestOptions,
    ) -> Result<Document, EngineError> {
        let cancel = CancellationToken::new();
        self.ingest_orchestrator
            .ingest(filename, bytes, options, &cancel)
            .await
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, EngineError> {
        let cancel = CancellationToken::new();
        self.search_engine.search(request, &cancel).await
    }

    /// Deletes a Document and every embedding record it owns, across both
    /// collections (spec.md §6.2, §3 "deleting a Document deletes every
    /// such record from both collections").
    pub fn delete(&self, doc_id: crate::types::DocId) -> Result<DeleteReport, EngineError> {
        let records_removed = self.store.delete_document(&doc_id.to_string())?;
        self.status.remove(doc_id);
        self.store.save()?;
        self.status.save()?;
        Ok(DeleteReport { records_removed })
    }

    pub fn document_status(&self, doc_id: crate::types::DocId) -> Option<Document> {
        self.status.get(doc_id)
    }

    pub fn list_documents(
        &self,
        status_filter: Option<crate::types::DocumentStatus>,
        sort: crate::types::DocumentSort,
        limit: usize,
        offset: usize,
    ) -> crate::types::DocumentPage {
        self.status.list(status_filter, sort, limit, offset)
    }
}
