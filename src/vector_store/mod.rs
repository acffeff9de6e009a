//! VectorStore (spec.md §4.3): the two logical collections (`visual`,
//! `text`), each independently indexed and persisted.

pub mod collection;
pub mod hnsw;

use std::path::Path;

pub use collection::Filter;
use collection::Collection;

use crate::error::StorageError;
use crate::types::{Kind, Record, RecordId};

pub struct VectorStore {
    visual: Collection,
    text: Collection,
}

impl VectorStore {
    pub fn open(dim: usize, data_dir: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            visual: Collection::open(Kind::Visual, dim, data_dir)?,
            text: Collection::open(Kind::Text, dim, data_dir)?,
        })
    }

    pub fn collection(&self, kind: Kind) -> &Collection {
        match kind {
            Kind::Visual => &self.visual,
            Kind::Text => &self.text,
        }
    }

    pub fn put(&self, record: Record) -> Result<(), StorageError> {
        self.collection(record.kind).put(record)
    }

    pub fn put_all(&self, records: Vec<Record>) -> Result<(), StorageError> {
        for record in records {
            self.put(record)?;
        }
        Ok(())
    }

    pub fn get(&self, kind: Kind, id: &RecordId) -> Option<Record> {
        self.collection(kind).get(id)
    }

    /// Deletes every record belonging to `doc_id` from both collections.
    /// Used by the ingest orchestrator's replace/delete lifecycle.
    pub fn delete_document(&self, doc_id: &str) -> Result<usize, StorageError> {
        let visual_removed = self.visual.delete_by_doc(doc_id)?;
        let text_removed = self.text.delete_by_doc(doc_id)?;
        Ok(visual_removed + text_removed)
    }

    /// All record ids currently stored for `doc_id`, across both
    /// collections. Used to compute which records a re-ingest made stale.
    pub fn ids_for_document(&self, doc_id: &str) -> Vec<RecordId> {
        let mut ids = self.visual.ids_for_doc(doc_id);
        ids.extend(self.text.ids_for_doc(doc_id));
        ids
    }

    pub fn delete_records(&self, kind: Kind, ids: &[RecordId]) -> Result<usize, StorageError> {
        self.collection(kind).delete(ids)
    }

    pub fn save(&self) -> Result<(), StorageError> {
        self.visual.save()?;
        self.text.save()?;
        Ok(())
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.visual.len(), self.text.len())
    }

    /// Exact, filtered count for one collection (spec.md §4.3
    /// `count(kind, filters)`), mirroring `Collection::search`'s filter
    /// application.
    pub fn count(&self, kind: Kind, filters: &[Filter]) -> usize {
        self.collection(kind).count(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocId, MultiVector, ReprRule};
    use std::collections::BTreeMap;

    fn mk_record(dim: usize, doc: &str, page: u32, seed: f32) -> Record {
        let doc_id = DocId::from_content(doc.as_bytes());
        let mut data = vec![seed; dim];
        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        for v in &mut data {
            *v /= norm;
        }
        let mv = MultiVector::new(dim as u32, 1, data);
        let representative = ReprRule::FirstToken.apply(&mv);
        Record {
            id: RecordId::visual(doc_id, page),
            doc_id,
            kind: Kind::Visual,
            representative,
            full_compressed: crate::codec::compress(&mv).unwrap(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn put_then_search_finds_nearest() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(4, dir.path()).unwrap();
        let r1 = mk_record(4, "doc-a", 0, 1.0);
        let r2 = mk_record(4, "doc-b", 0, -1.0);
        store.put(r1.clone()).unwrap();
        store.put(r2).unwrap();

        let results = store
            .collection(Kind::Visual)
            .search(&r1.representative, 1, &[])
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, r1.id);
    }

    #[test]
    fn delete_document_removes_across_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(4, dir.path()).unwrap();
        let r1 = mk_record(4, "doc-a", 0, 1.0);
        let doc_id = r1.doc_id.to_string();
        store.put(r1).unwrap();
        assert_eq!(store.counts().0, 1);

        let removed = store.delete_document(&doc_id).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.counts().0, 0);
    }

    #[test]
    fn corrupt_index_file_rebuilds_from_records_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open(4, dir.path()).unwrap();
            store.put(mk_record(4, "doc-a", 0, 1.0)).unwrap();
            store.save().unwrap();
        }
        std::fs::write(dir.path().join("visual.usearch"), b"not a real usearch index").unwrap();

        let reopened = VectorStore::open(4, dir.path()).unwrap();
        assert_eq!(reopened.counts().0, 1);
        let query = mk_record(4, "doc-a", 0, 1.0).representative;
        let results = reopened.collection(Kind::Visual).search(&query, 1, &[]).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn count_applies_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(4, dir.path()).unwrap();
        let mut r1 = mk_record(4, "doc-a", 0, 1.0);
        r1.metadata.insert("chunk_index".to_string(), crate::types::MetaValue::Int(0));
        let mut r2 = mk_record(4, "doc-b", 0, -1.0);
        r2.metadata.insert("chunk_index".to_string(), crate::types::MetaValue::Int(5));
        store.put(r1).unwrap();
        store.put(r2).unwrap();

        assert_eq!(store.count(Kind::Visual, &[]), 2);
        let filters = vec![Filter::Eq("chunk_index".to_string(), crate::types::MetaValue::Int(0))];
        assert_eq!(store.count(Kind::Visual, &filters), 1);
    }

    #[test]
    fn put_replaces_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(4, dir.path()).unwrap();
        let mut r1 = mk_record(4, "doc-a", 0, 1.0);
        store.put(r1.clone()).unwrap();
        r1.representative = vec![0.5, 0.5, 0.5, 0.5];
        store.put(r1.clone()).unwrap();
        assert_eq!(store.counts().0, 1);
    }
}
