//! Demonstrates the engine end to end: bootstrap tracing, build an
//! `Engine` over `MockEmbedder`/`MockParser`, ingest a couple of synthetic
//! documents, run one query, print the response. Grounded on `main.rs`'s
//! tracing-subscriber registry and panic hook, minus the axum server it
//! boots there (no HTTP surface in this crate).

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use docuvec::capability::{MockEmbedder, MockParser};
use docuvec::config::EngineConfig;
use docuvec::engine::Engine;
use docuvec::ingest::IngestOptions;
use docuvec::search_engine::{SearchMode, SearchRequest};

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = std::env::var("DOCUVEC_LOG_DIR").unwrap_or_else(|_| {
        dirs::data_local_dir()
            .map(|d| d.join("docuvec").join("logs").to_string_lossy().to_string())
            .unwrap_or_else(|| ".docuvec-data/logs".to_string())
    });
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "docuvec.log");
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "docuvec=info".into());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(non_blocking_writer)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!(target: "docuvec::panic", "{panic_info}");
        default_panic(panic_info);
    }));

    let data_dir = std::env::temp_dir().join(format!("docuvec-demo-{}", std::process::id()));
    let config = EngineConfig {
        deployment_dim: 16,
        allowed_extensions: vec!["txt".to_string()],
        data_dir: data_dir.to_string_lossy().to_string(),
        ..EngineConfig::default()
    };

    info!(data_dir = %config.data_dir, "starting docuvec demo");

    let embedder = Arc::new(MockEmbedder::new(config.deployment_dim as u32));
    let parser = Arc::new(MockParser::new(8));
    let engine = Engine::new(config, embedder, parser)?;

    engine
        .ingest(
            "lighthouse.txt",
            b"a red lighthouse stands on the rocky northern coastline at dusk",
            IngestOptions::default(),
        )
        .await?;
    engine
        .ingest(
            "harbor.txt",
            b"fishing boats return to the harbor as the morning fog lifts",
            IngestOptions::default(),
        )
        .await?;

    let response = engine
        .search(SearchRequest {
            query: "lighthouse on the coast".to_string(),
            n_results: 5,
            mode: SearchMode::TextOnly,
            filters: Vec::new(),
            enable_rerank: true,
        })
        .await?;

    info!(
        candidates_retrieved = response.candidates_retrieved,
        reranked_count = response.reranked_count,
        degraded = response.degraded,
        t_total_ms = response.t_total_ms,
        "search complete"
    );
    for result in &response.results {
        println!(
            "doc={} score={:.4} record={}",
            result.doc_id, result.score, result.record_id
        );
    }

    Ok(())
}
