//! SearchEngine (spec.md §4.6): two-stage retrieval — Stage-1 approximate
//! per-collection ANN search over representative vectors, Stage-2 exact
//! MaxSim re-rank over the decompressed candidates. Grounded on the
//! teacher's `semantic_search` two-phase shape (embed query, search index,
//! convert distance to score) and on the pack's `two_tier.rs` staged
//! refinement structure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::capability::Embedder;
use crate::codec;
use crate::config::EngineConfig;
use crate::error::{EngineError, StorageError};
use crate::query::QueryProcessor;
use crate::ranker::{ResultRanker, ScoredCandidate, SearchResult};
use crate::scorer;
use crate::stats::{RollingStats, StatSummary};
use crate::types::Kind;
use crate::vector_store::{Filter, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Hybrid,
    VisualOnly,
    TextOnly,
}

impl SearchMode {
    fn collections(self) -> Vec<Kind> {
        match self {
            SearchMode::Hybrid => vec![Kind::Visual, Kind::Text],
            SearchMode::VisualOnly => vec![Kind::Visual],
            SearchMode::TextOnly => vec![Kind::Text],
        }
    }
}

pub struct SearchRequest {
    pub query: String,
    pub n_results: usize,
    pub mode: SearchMode,
    pub filters: Vec<Filter>,
    pub enable_rerank: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            n_results: 10,
            mode: SearchMode::Hybrid,
            filters: Vec::new(),
            enable_rerank: true,
        }
    }
}

pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub candidates_retrieved: usize,
    pub reranked_count: usize,
    pub degraded: bool,
    pub t_stage1_ms: u64,
    pub t_stage2_ms: u64,
    pub t_total_ms: u64,
}

pub struct SearchEngine {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    query_processor: QueryProcessor,
    stage1_stats: Arc<RollingStats>,
    stage2_stats: Arc<RollingStats>,
    total_stats: Arc<RollingStats>,
    /// Bounds concurrent `search` calls (spec.md §5 "Query path: a
    /// fixed-size worker pool sized to min(num_cores, configured_max)").
    query_semaphore: Arc<tokio::sync::Semaphore>,
    config: EngineConfig,
}

/// Rolling latency summary for each phase of the search path (spec.md
/// §6.1 `stats() -> SearchStats`: "rolling mean, p95 of Stage-1, Stage-2,
/// total; total queries").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchStats {
    pub stage1: StatSummary,
    pub stage2: StatSummary,
    pub total: StatSummary,
}

impl SearchEngine {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        query_processor: QueryProcessor,
        config: EngineConfig,
    ) -> Self {
        let num_cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        let workers = num_cores.min(config.query_workers.max(1));
        Self {
            store,
            embedder,
            query_processor,
            stage1_stats: Arc::new(RollingStats::new()),
            stage2_stats: Arc::new(RollingStats::new()),
            total_stats: Arc::new(RollingStats::new()),
            query_semaphore: Arc::new(tokio::sync::Semaphore::new(workers)),
            config,
        }
    }

    pub fn stats(&self) -> SearchStats {
        SearchStats {
            stage1: self.stage1_stats.summary(),
            stage2: self.stage2_stats.summary(),
            total: self.total_stats.summary(),
        }
    }

    pub async fn search(
        &self,
        request: SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, EngineError> {
        let _permit = self
            .query_semaphore
            .acquire()
            .await
            .map_err(|_| EngineError::Internal("query semaphore closed".into()))?;

        let total_start = Instant::now();
        let (query_mv, query_repr) = self
            .query_processor
            .process(&request.query, self.embedder.as_ref())?;

        let end_to_end_timeout = Duration::from_millis(self.config.end_to_end_timeout_ms);
        let run = async {
            self.run_stages(&request, &query_mv, &query_repr, cancel)
                .await
        };

        let (per_collection, degraded, t_stage1_ms, t_stage2_ms) =
            match tokio::time::timeout(end_to_end_timeout, run).await {
                Ok(result) => result?,
                Err(_) => return Err(EngineError::Timeout(self.config.end_to_end_timeout_ms)),
            };

        let candidates_retrieved: usize = per_collection.iter().map(|(_, v)| v.len()).sum();
        let reranked_count = if request.enable_rerank {
            candidates_retrieved
        } else {
            0
        };

        let results = ResultRanker::rank(per_collection, request.n_results);
        let t_total_ms = total_start.elapsed().as_millis() as u64;
        self.stage1_stats.record(t_stage1_ms as f64);
        self.stage2_stats.record(t_stage2_ms as f64);
        self.total_stats.record(t_total_ms as f64);

        Ok(SearchResponse {
            results,
            candidates_retrieved,
            reranked_count,
            degraded,
            t_stage1_ms,
            t_stage2_ms,
            t_total_ms,
        })
    }

    async fn run_stages(
        &self,
        request: &SearchRequest,
        query_mv: &crate::types::MultiVector,
        query_repr: &[f32],
        cancel: &CancellationToken,
    ) -> Result<(Vec<(Kind, Vec<ScoredCandidate>)>, bool, u64, u64), EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let stage1_start = Instant::now();
        let stage1_timeout = Duration::from_millis(self.config.stage1_timeout_ms);
        let kinds = request.mode.collections();

        let mut stage1_results: Vec<(Kind, Result<Vec<(crate::types::RecordId, f32, crate::types::Record)>, StorageError>)> =
            Vec::new();
        for kind in &kinds {
            let store = Arc::clone(&self.store);
            let kind = *kind;
            let query_repr = query_repr.to_vec();
            let filters = request.filters.clone();
            let k = self.config.stage1_candidates;
            let fut = tokio::task::spawn_blocking(move || {
                store.collection(kind).search(&query_repr, k, &filters)
            });
            let outcome = tokio::time::timeout(stage1_timeout, fut).await;
            let result = match outcome {
                Ok(Ok(r)) => r,
                Ok(Err(_join_err)) => Err(StorageError::Unavailable("search task panicked".into())),
                Err(_) => Err(StorageError::Timeout),
            };
            stage1_results.push((kind, result));
        }

        let mut degraded = false;
        let mut ok_any = false;
        let mut stage1_ok: Vec<(Kind, Vec<(crate::types::RecordId, f32, crate::types::Record)>)> =
            Vec::new();
        for (kind, result) in stage1_results {
            match result {
                Ok(hits) => {
                    ok_any = true;
                    stage1_ok.push((kind, hits));
                }
                Err(_) => degraded = true,
            }
        }
        if !ok_any {
            return Err(EngineError::Storage(StorageError::Unavailable(
                "all collections unavailable for stage-1".into(),
            )));
        }
        let t_stage1_ms = stage1_start.elapsed().as_millis() as u64;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let stage2_start = Instant::now();
        let stage2_timeout = Duration::from_millis(self.config.stage2_timeout_ms);
        let per_collection = if request.enable_rerank {
            let query_mv = query_mv.clone();
            let rerank = async {
                stage1_ok
                    .into_iter()
                    .map(|(kind, hits)| (kind, Self::rerank_collection(&query_mv, hits)))
                    .collect::<Vec<_>>()
            };
            match tokio::time::timeout(stage2_timeout, rerank).await {
                Ok(v) => v,
                Err(_) => {
                    degraded = true;
                    Vec::new()
                }
            }
        } else {
            stage1_ok
                .into_iter()
                .map(|(kind, hits)| {
                    let candidates = hits
                        .into_iter()
                        .map(|(id, score, record)| ScoredCandidate {
                            record_id: id,
                            doc_id: record.doc_id,
                            kind: record.kind,
                            raw_score: score,
                            metadata: record.metadata,
                        })
                        .collect();
                    (kind, candidates)
                })
                .collect()
        };
        let t_stage2_ms = stage2_start.elapsed().as_millis() as u64;

        Ok((per_collection, degraded, t_stage1_ms, t_stage2_ms))
    }

    /// Decompresses each candidate's full multi-vector and computes exact
    /// MaxSim, fanning the per-candidate work out across a rayon pool since
    /// decompression and scoring are independent per candidate. Corrupt
    /// candidates are skipped, not fatal (spec.md §4.6).
    fn rerank_collection(
        query_mv: &crate::types::MultiVector,
        hits: Vec<(crate::types::RecordId, f32, crate::types::Record)>,
    ) -> Vec<ScoredCandidate> {
        hits.into_par_iter()
            .filter_map(|(id, _stage1_score, record)| {
                let full = codec::decompress(&record.full_compressed)
                    .inspect_err(|e| {
                        tracing::warn!(record_id = %id, error = %e, "corrupt embedding, skipping")
                    })
                    .ok()?;
                let score = scorer::maxsim(query_mv, &full)
                    .inspect_err(|e| {
                        tracing::warn!(record_id = %id, error = %e, "scoring failed, skipping")
                    })
                    .ok()?;
                Some(ScoredCandidate {
                    record_id: id,
                    doc_id: record.doc_id,
                    kind: record.kind,
                    raw_score: score,
                    metadata: record.metadata,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MockEmbedder;
    use crate::types::{DocId, Kind as RecordKind, Metadata as RecordMetadata, Record, ReprRule};

    fn put_record(store: &VectorStore, dim: usize, doc: &str, text: &str) {
        let embedder = MockEmbedder::new(dim as u32);
        let mv = embedder.embed_text(text).unwrap();
        let representative = ReprRule::FirstToken.apply(&mv);
        let doc_id = DocId::from_content(doc.as_bytes());
        store
            .put(Record {
                id: crate::types::RecordId::text(doc_id, 0),
                doc_id,
                kind: RecordKind::Text,
                representative,
                full_compressed: codec::compress(&mv).unwrap(),
                metadata: RecordMetadata::new(),
            })
            .unwrap();
    }

    fn engine(dir: &std::path::Path, dim: usize) -> SearchEngine {
        let store = Arc::new(VectorStore::open(dim, dir).unwrap());
        let embedder: Arc<dyn crate::capability::Embedder> = Arc::new(MockEmbedder::new(dim as u32));
        let qp = QueryProcessor::new(ReprRule::FirstToken);
        SearchEngine::new(store, embedder, qp, EngineConfig {
            deployment_dim: dim,
            ..EngineConfig::default()
        })
    }

    #[tokio::test]
    async fn search_over_empty_store_returns_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let se = engine(dir.path(), 8);
        let cancel = CancellationToken::new();
        let response = se
            .search(
                SearchRequest {
                    query: "anything".to_string(),
                    n_results: 5,
                    mode: SearchMode::TextOnly,
                    filters: Vec::new(),
                    enable_rerank: true,
                },
                &cancel,
            )
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert!(!response.degraded);
    }

    #[tokio::test]
    async fn disabling_rerank_skips_stage2_scoring() {
        let dir = tempfile::tempdir().unwrap();
        let se = engine(dir.path(), 8);
        put_record(&se.store, 8, "doc-a", "red lighthouse on a cliff");
        let cancel = CancellationToken::new();

        let response = se
            .search(
                SearchRequest {
                    query: "red lighthouse".to_string(),
                    n_results: 5,
                    mode: SearchMode::TextOnly,
                    filters: Vec::new(),
                    enable_rerank: false,
                },
                &cancel,
            )
            .await
            .unwrap();
        assert!(!response.results.is_empty());
        assert_eq!(response.reranked_count, 0);
    }

    #[tokio::test]
    async fn stats_track_each_stage_separately() {
        let dir = tempfile::tempdir().unwrap();
        let se = engine(dir.path(), 8);
        put_record(&se.store, 8, "doc-a", "red lighthouse on a cliff");
        let cancel = CancellationToken::new();

        se.search(
            SearchRequest {
                query: "red lighthouse".to_string(),
                n_results: 5,
                mode: SearchMode::TextOnly,
                filters: Vec::new(),
                enable_rerank: true,
            },
            &cancel,
        )
        .await
        .unwrap();

        let stats = se.stats();
        assert_eq!(stats.stage1.count, 1);
        assert_eq!(stats.stage2.count, 1);
        assert_eq!(stats.total.count, 1);
    }
}
