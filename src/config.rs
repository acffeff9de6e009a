use serde::{Deserialize, Serialize};

use crate::types::ReprRule;

/// File extensions the default `Parser` capability is expected to accept.
/// Downstream `Parser` implementations may use a different list; this is
/// only the default the engine ships with.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "txt", "md"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deployment-fixed embedding width for representative vectors.
    pub deployment_dim: usize,
    /// Deployment-fixed rule for deriving a representative vector from a
    /// multi-vector. Changing this across restarts invalidates the index.
    pub repr_rule: ReprRule,
    /// How many Stage-1 ANN candidates to retrieve per collection before
    /// Stage-2 re-ranking.
    pub stage1_candidates: usize,
    pub stage1_timeout_ms: u64,
    pub stage2_timeout_ms: u64,
    pub end_to_end_timeout_ms: u64,
    pub max_metadata_bytes: usize,
    /// Worker pool size for ingestion. Defaults to 1 since embedding
    /// typically runs against a single GPU/accelerator context.
    pub ingest_workers: usize,
    pub query_workers: usize,
    pub allowed_extensions: Vec<String>,
    pub max_file_size_mb: u64,
    pub data_dir: String,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("DOCUVEC_DATA_DIR").unwrap_or_else(|_| {
            dirs::data_local_dir()
                .map(|d| d.join("docuvec").to_string_lossy().to_string())
                .unwrap_or_else(|| ".docuvec-data".to_string())
        });

        Self {
            deployment_dim: std::env::var("DOCUVEC_DEPLOYMENT_DIM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(128),
            repr_rule: match std::env::var("DOCUVEC_REPR_RULE").as_deref() {
                Ok("max_pool") => ReprRule::MaxPool,
                _ => ReprRule::FirstToken,
            },
            stage1_candidates: std::env::var("DOCUVEC_STAGE1_CANDIDATES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64),
            stage1_timeout_ms: std::env::var("DOCUVEC_STAGE1_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            stage2_timeout_ms: std::env::var("DOCUVEC_STAGE2_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(150),
            end_to_end_timeout_ms: std::env::var("DOCUVEC_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            max_metadata_bytes: std::env::var("DOCUVEC_MAX_METADATA_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::metadata::DEFAULT_MAX_METADATA_BYTES),
            ingest_workers: std::env::var("DOCUVEC_INGEST_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            query_workers: std::env::var("DOCUVEC_QUERY_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            allowed_extensions: std::env::var("DOCUVEC_ALLOWED_EXTENSIONS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| {
                    DEFAULT_ALLOWED_EXTENSIONS
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                }),
            max_file_size_mb: std::env::var("DOCUVEC_MAX_FILE_SIZE_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            data_dir,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deployment_dim: 128,
            repr_rule: ReprRule::FirstToken,
            stage1_candidates: 64,
            stage1_timeout_ms: 200,
            stage2_timeout_ms: 150,
            end_to_end_timeout_ms: 500,
            max_metadata_bytes: crate::metadata::DEFAULT_MAX_METADATA_BYTES,
            ingest_workers: 1,
            query_workers: 4,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size_mb: 50,
            data_dir: ".docuvec-data".to_string(),
        }
    }
}
