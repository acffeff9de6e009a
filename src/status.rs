//! Status (spec.md §4.9): document lifecycle tracking and the query
//! interface callers use to poll ingest progress. Grounded on
//! `workspace.rs::WorkspaceManager` (DashMap + atomic-rename JSON
//! persistence via "write tmp, rename").

use std::path::{Path, PathBuf};

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::types::{DocId, Document, DocumentPage, DocumentSort, DocumentStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub id: Uuid,
    pub doc_id: DocId,
    pub timestamp: chrono::DateTime<Utc>,
    pub from: Option<DocumentStatus>,
    pub to: DocumentStatus,
    pub message: Option<String>,
}

pub struct Status {
    documents: DashMap<DocId, Document>,
    events: DashMap<DocId, Vec<StatusEvent>>,
    path: PathBuf,
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    documents: Vec<Document>,
}

impl Status {
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let path = data_dir.join("documents.json");

        let documents = if path.exists() {
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| serde_json::from_str::<Snapshot>(&s).ok())
                .map(|snap| snap.documents.into_iter().map(|d| (d.doc_id, d)).collect())
                .unwrap_or_default()
        } else {
            DashMap::new()
        };

        Ok(Self {
            documents,
            events: DashMap::new(),
            path,
        })
    }

    pub fn create_queued(&self, doc_id: DocId, filename: String) -> Document {
        let now = Utc::now();
        let document = Document {
            doc_id,
            filename,
            status: DocumentStatus::Queued,
            created_at: now,
            updated_at: now,
            visual_count: 0,
            text_count: 0,
            failure_reason: None,
            retriable: None,
            warnings: Vec::new(),
        };
        self.documents.insert(doc_id, document.clone());
        self.record_event(doc_id, None, DocumentStatus::Queued, None);
        document
    }

    pub fn transition(
        &self,
        doc_id: DocId,
        to: DocumentStatus,
        message: Option<String>,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .documents
            .get_mut(&doc_id)
            .ok_or_else(|| StorageError::NotFound(doc_id.to_string()))?;
        let from = entry.status;
        entry.status = to;
        entry.updated_at = Utc::now();
        if to == DocumentStatus::Failed {
            entry.failure_reason = message.clone();
        }
        drop(entry);
        self.record_event(doc_id, Some(from), to, message);
        Ok(())
    }

    pub fn set_counts(&self, doc_id: DocId, visual_count: usize, text_count: usize) {
        if let Some(mut doc) = self.documents.get_mut(&doc_id) {
            doc.visual_count = visual_count;
            doc.text_count = text_count;
            doc.updated_at = Utc::now();
        }
    }

    pub fn add_warning(&self, doc_id: DocId, warning: String) {
        if let Some(mut doc) = self.documents.get_mut(&doc_id) {
            doc.warnings.push(warning);
        }
    }

    pub fn set_retriable(&self, doc_id: DocId, retriable: bool) {
        if let Some(mut doc) = self.documents.get_mut(&doc_id) {
            doc.retriable = Some(retriable);
        }
    }

    pub fn get(&self, doc_id: DocId) -> Option<Document> {
        self.documents.get(&doc_id).map(|d| d.clone())
    }

    pub fn events_for(&self, doc_id: DocId) -> Vec<StatusEvent> {
        self.events.get(&doc_id).map(|e| e.clone()).unwrap_or_default()
    }

    /// Paged, sorted, status-filtered view over tracked documents
    /// (spec.md §6.2 `list_documents(limit, offset, sort, filters)`).
    /// `total` in the returned page counts matches before pagination.
    pub fn list(
        &self,
        status_filter: Option<DocumentStatus>,
        sort: DocumentSort,
        limit: usize,
        offset: usize,
    ) -> DocumentPage {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .map(|e| e.value().clone())
            .filter(|d| status_filter.is_none_or(|s| d.status == s))
            .collect();
        match sort {
            DocumentSort::AddedDesc => docs.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            DocumentSort::NameAsc => docs.sort_by(|a, b| a.filename.cmp(&b.filename)),
            DocumentSort::PagesDesc => docs.sort_by(|a, b| {
                (b.visual_count + b.text_count).cmp(&(a.visual_count + a.text_count))
            }),
        }
        let total = docs.len();
        let documents = docs.into_iter().skip(offset).take(limit).collect();
        DocumentPage { documents, total }
    }

    pub fn remove(&self, doc_id: DocId) {
        self.documents.remove(&doc_id);
        self.events.remove(&doc_id);
    }

    fn record_event(
        &self,
        doc_id: DocId,
        from: Option<DocumentStatus>,
        to: DocumentStatus,
        message: Option<String>,
    ) {
        let event = StatusEvent {
            id: Uuid::new_v4(),
            doc_id,
            timestamp: Utc::now(),
            from,
            to,
            message,
        };
        self.events.entry(doc_id).or_default().push(event);
    }

    pub fn save(&self) -> Result<(), StorageError> {
        let snapshot = Snapshot {
            documents: self.documents.iter().map(|e| e.value().clone()).collect(),
        };
        let json =
            serde_json::to_string(&snapshot).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let status = Status::open(dir.path()).unwrap();
        let doc_id = DocId::from_content(b"doc");
        status.create_queued(doc_id, "a.pdf".to_string());
        status
            .transition(doc_id, DocumentStatus::Processing, None)
            .unwrap();
        status
            .transition(doc_id, DocumentStatus::Completed, None)
            .unwrap();

        let doc = status.get(doc_id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(status.events_for(doc_id).len(), 3);
    }

    #[test]
    fn failed_transition_records_reason() {
        let dir = tempfile::tempdir().unwrap();
        let status = Status::open(dir.path()).unwrap();
        let doc_id = DocId::from_content(b"doc");
        status.create_queued(doc_id, "a.pdf".to_string());
        status
            .transition(doc_id, DocumentStatus::Failed, Some("boom".to_string()))
            .unwrap();
        let doc = status.get(doc_id).unwrap();
        assert_eq!(doc.failure_reason.as_deref(), Some("boom"));
    }

    #[test]
    fn list_filters_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let status = Status::open(dir.path()).unwrap();
        let a = DocId::from_content(b"a");
        let b = DocId::from_content(b"b");
        status.create_queued(a, "a.pdf".to_string());
        status.create_queued(b, "b.pdf".to_string());
        status.transition(b, DocumentStatus::Completed, None).unwrap();

        let queued = status.list(Some(DocumentStatus::Queued), DocumentSort::AddedDesc, 10, 0);
        assert_eq!(queued.documents.len(), 1);
        assert_eq!(queued.total, 1);
        assert_eq!(queued.documents[0].doc_id, a);
    }

    #[test]
    fn list_paginates_and_sorts_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let status = Status::open(dir.path()).unwrap();
        status.create_queued(DocId::from_content(b"a"), "zebra.pdf".to_string());
        status.create_queued(DocId::from_content(b"b"), "apple.pdf".to_string());
        status.create_queued(DocId::from_content(b"c"), "mango.pdf".to_string());

        let page = status.list(None, DocumentSort::NameAsc, 2, 0);
        assert_eq!(page.total, 3);
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[0].filename, "apple.pdf");
        assert_eq!(page.documents[1].filename, "mango.pdf");

        let next_page = status.list(None, DocumentSort::NameAsc, 2, 2);
        assert_eq!(next_page.documents.len(), 1);
        assert_eq!(next_page.documents[0].filename, "zebra.pdf");
    }
}
