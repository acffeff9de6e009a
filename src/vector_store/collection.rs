//! A single logical collection (`visual` or `text`): an HNSW index over
//! representative vectors plus the primary `id -> Record` map
//! (spec.md §3 "Collection"). Grounded on the teacher's
//! `WorkspaceVectorState` (usearch index + `HashMap<u64, ChunkMeta>`),
//! generalized to a concurrent `DashMap` since records here are written
//! from async ingest tasks, not a single mutex-guarded indexer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::types::{Kind, MetaValue, Metadata, Record, RecordId};
use crate::vector_store::hnsw;

#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, MetaValue),
    In(String, Vec<MetaValue>),
    Range {
        key: String,
        min: Option<MetaValue>,
        max: Option<MetaValue>,
    },
}

pub fn matches_filters(metadata: &Metadata, filters: &[Filter]) -> bool {
    filters.iter().all(|f| match f {
        Filter::Eq(key, val) => metadata.get(key).is_some_and(|v| v == val),
        Filter::In(key, vals) => metadata.get(key).is_some_and(|v| vals.contains(v)),
        Filter::Range { key, min, max } => match metadata.get(key) {
            Some(v) => {
                let above_min = min
                    .as_ref()
                    .is_none_or(|m| matches!(v.partial_compare(m), Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)));
                let below_max = max
                    .as_ref()
                    .is_none_or(|m| matches!(v.partial_compare(m), Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)));
                above_min && below_max
            }
            None => false,
        },
    })
}

#[derive(Serialize, Deserialize, Default)]
struct KeyMapSidecar {
    /// usearch key -> record id, so the index can be reopened and
    /// reconciled against the records map.
    key_to_id: BTreeMap<u64, String>,
    next_key: u64,
}

pub struct Collection {
    kind: Kind,
    dim: usize,
    index: RwLock<usearch::Index>,
    records: DashMap<RecordId, Record>,
    key_to_id: DashMap<u64, RecordId>,
    id_to_key: DashMap<RecordId, u64>,
    next_key: AtomicU64,
    index_path: PathBuf,
    records_path: PathBuf,
    keymap_path: PathBuf,
}

impl Collection {
    pub fn open(kind: Kind, dim: usize, data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let index_path = data_dir.join(format!("{}.usearch", kind.as_str()));
        let records_path = data_dir.join(format!("{}_records.json", kind.as_str()));
        let keymap_path = data_dir.join(format!("{}_keymap.json", kind.as_str()));

        let (index, needs_rebuild) = hnsw::open_or_create(dim, &index_path)?;

        let records: DashMap<RecordId, Record> = if records_path.exists() {
            std::fs::read_to_string(&records_path)
                .ok()
                .and_then(|s| serde_json::from_str::<Vec<Record>>(&s).ok())
                .map(|v| v.into_iter().map(|r| (r.id.clone(), r)).collect())
                .unwrap_or_default()
        } else {
            DashMap::new()
        };

        let key_to_id = DashMap::new();
        let id_to_key = DashMap::new();
        let next_key = AtomicU64::new(0);

        if needs_rebuild {
            // The index file was missing or corrupt; re-derive it from the
            // records we still have on disk rather than leaving them
            // orphaned from search (`get` would still find them, `search`
            // never would).
            if !records.is_empty() {
                hnsw::ensure_capacity(&index, records.len())
                    .map_err(|e| StorageError::CorruptIndex(e.to_string()))?;
            }
            for entry in records.iter() {
                let key = next_key.fetch_add(1, Ordering::SeqCst);
                index
                    .add(key, &entry.value().representative)
                    .map_err(|e| StorageError::CorruptIndex(e.to_string()))?;
                key_to_id.insert(key, entry.key().clone());
                id_to_key.insert(entry.key().clone(), key);
            }
        } else {
            let sidecar: KeyMapSidecar = if keymap_path.exists() {
                std::fs::read_to_string(&keymap_path)
                    .ok()
                    .and_then(|s| serde_json::from_str(&s).ok())
                    .unwrap_or_default()
            } else {
                KeyMapSidecar::default()
            };
            for (key, id) in sidecar.key_to_id {
                let rid = RecordId(id);
                key_to_id.insert(key, rid.clone());
                id_to_key.insert(rid, key);
            }
            next_key.store(sidecar.next_key, Ordering::SeqCst);
        }

        Ok(Self {
            kind,
            dim,
            index: RwLock::new(index),
            records,
            key_to_id,
            id_to_key,
            next_key,
            index_path,
            records_path,
            keymap_path,
        })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact count of records matching `filters` (spec.md §4.3
    /// `count(kind, filters)`). An empty filter list counts everything.
    pub fn count(&self, filters: &[Filter]) -> usize {
        if filters.is_empty() {
            return self.records.len();
        }
        self.records
            .iter()
            .filter(|e| matches_filters(&e.metadata, filters))
            .count()
    }

    /// Inserts or replaces a record. Replacing an existing id removes its
    /// old vector from the index first (last-writer-wins, mirroring the
    /// teacher's `reindex_file_vectors` remove-then-reinsert pattern).
    pub fn put(&self, record: Record) -> Result<(), StorageError> {
        if record.representative.len() != self.dim {
            return Err(StorageError::CorruptIndex(format!(
                "representative vector dim {} does not match collection dim {}",
                record.representative.len(),
                self.dim
            )));
        }

        if let Some((_, old_key)) = self.id_to_key.remove(&record.id) {
            self.key_to_id.remove(&old_key);
            let index = self.index.write();
            let _ = index.remove(old_key);
        }

        let key = self.next_key.fetch_add(1, Ordering::SeqCst);
        {
            let index = self.index.write();
            hnsw::ensure_capacity(&index, self.records.len() + 1)?;
            index
                .add(key, &record.representative)
                .map_err(|e| StorageError::CorruptIndex(e.to_string()))?;
        }

        self.key_to_id.insert(key, record.id.clone());
        self.id_to_key.insert(record.id.clone(), key);
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.records.get(id).map(|r| r.clone())
    }

    /// Removes the given ids. Returns how many were actually present.
    pub fn delete(&self, ids: &[RecordId]) -> Result<usize, StorageError> {
        let mut removed = 0;
        let index = self.index.write();
        for id in ids {
            if let Some((_, key)) = self.id_to_key.remove(id) {
                self.key_to_id.remove(&key);
                self.records.remove(id);
                let _ = index.remove(key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn delete_by_doc(&self, doc_id: &str) -> Result<usize, StorageError> {
        let ids = self.ids_for_doc(doc_id);
        self.delete(&ids)
    }

    pub fn ids_for_doc(&self, doc_id: &str) -> Vec<RecordId> {
        self.records
            .iter()
            .filter(|e| e.doc_id.to_string() == doc_id)
            .map(|e| e.id.clone())
            .collect()
    }

    /// Stage-1 approximate search: usearch distance (cosine distance, so
    /// `1 - distance` is the similarity) over representative vectors.
    /// Filters are applied after retrieval by oversampling `k` — the
    /// underlying ANN index has no native predicate support.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        filters: &[Filter],
    ) -> Result<Vec<(RecordId, f32, Record)>, StorageError> {
        if query.len() != self.dim {
            return Err(StorageError::CorruptIndex(format!(
                "query dim {} does not match collection dim {}",
                query.len(),
                self.dim
            )));
        }
        if self.records.is_empty() {
            return Ok(Vec::new());
        }

        let oversample = if filters.is_empty() { k } else { (k * 4).max(k) };
        let result = {
            let index = self.index.read();
            index
                .search(query, oversample)
                .map_err(|e| StorageError::CorruptIndex(e.to_string()))?
        };

        let mut out = Vec::with_capacity(result.keys.len());
        for (key, distance) in result.keys.iter().zip(result.distances.iter()) {
            let Some(id) = self.key_to_id.get(key).map(|r| r.clone()) else {
                continue;
            };
            let Some(record) = self.records.get(&id).map(|r| r.clone()) else {
                continue;
            };
            if !matches_filters(&record.metadata, filters) {
                continue;
            }
            out.push((id, 1.0 - distance, record));
            if out.len() >= k {
                break;
            }
        }
        Ok(out)
    }

    pub fn save(&self) -> Result<(), StorageError> {
        {
            let index = self.index.read();
            index
                .save(self.index_path.to_string_lossy().as_ref())
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        }

        let all_records: Vec<Record> = self.records.iter().map(|e| e.value().clone()).collect();
        let json = serde_json::to_string(&all_records)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let tmp_path = self.records_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.records_path)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let sidecar = KeyMapSidecar {
            key_to_id: self
                .key_to_id
                .iter()
                .map(|e| (*e.key(), e.value().0.clone()))
                .collect(),
            next_key: self.next_key.load(Ordering::SeqCst),
        };
        let sidecar_json =
            serde_json::to_string(&sidecar).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        std::fs::write(&self.keymap_path, sidecar_json)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(())
    }
}
