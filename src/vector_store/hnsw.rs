//! HNSW index construction/persistence helpers, lifted from the teacher's
//! per-workspace vector index setup (`embedder.rs::get_or_create_workspace`)
//! and generalized from "one index per workspace" to "one index per
//! collection."

use std::path::Path;

use usearch::ffi::{IndexOptions, MetricKind, ScalarKind};

use crate::error::StorageError;

const INITIAL_CAPACITY: usize = 4096;

pub fn build_index_options(dim: usize) -> IndexOptions {
    IndexOptions {
        dimensions: dim,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F16,
        connectivity: 16,
        expansion_add: 128,
        expansion_search: 64,
        multi: false,
    }
}

/// Creates a fresh index, or loads one from `index_path` if it already
/// exists on disk. Returns `(index, needs_rebuild)`: when the on-disk file
/// is missing or fails to load, the returned index is empty and
/// `needs_rebuild` is `true`, signalling the caller to repopulate it from
/// its own record store (spec.md §4.3 "rebuild-from-records must be
/// possible and is the recovery path for corrupted index files").
pub fn open_or_create(dim: usize, index_path: &Path) -> Result<(usearch::Index, bool), StorageError> {
    let options = build_index_options(dim);
    let index = usearch::Index::new(&options)
        .map_err(|e| StorageError::CorruptIndex(format!("failed to create index: {e}")))?;

    let needs_rebuild = if index_path.exists() {
        if let Err(e) = index.load(index_path.to_string_lossy().as_ref()) {
            tracing::warn!("failed to load existing index at {index_path:?}, rebuilding: {e}");
            true
        } else {
            false
        }
    } else {
        true
    };

    if needs_rebuild {
        index
            .reserve(INITIAL_CAPACITY)
            .map_err(|e| StorageError::CorruptIndex(e.to_string()))?;
    }

    Ok((index, needs_rebuild))
}

pub fn ensure_capacity(index: &usearch::Index, needed: usize) -> Result<(), StorageError> {
    if needed > index.capacity() {
        index
            .reserve(needed.max(index.capacity() * 2).max(INITIAL_CAPACITY))
            .map_err(|e| StorageError::CorruptIndex(e.to_string()))?;
    }
    Ok(())
}
