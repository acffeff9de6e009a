//! Multi-vector late-interaction retrieval engine over compressed
//! ColPali-style embeddings: two collections (visual, text), a two-stage
//! search pipeline (approximate Stage-1 ANN, exact Stage-2 MaxSim
//! re-rank), and an idempotent ingest orchestrator. See `SPEC_FULL.md` for
//! the full component breakdown.

pub mod capability;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metadata;
pub mod query;
pub mod ranker;
pub mod scorer;
pub mod search_engine;
pub mod status;
pub mod stats;
pub mod types;
pub mod vector_store;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
