//! Shared data types for the retrieval engine: multi-vectors, representative
//! vectors, records, and documents (spec.md §3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A sequence of `seq_len` fixed-dimension, L2-normalized token vectors.
///
/// Stored in memory as `f32` even when the on-disk encoding is `f16`
/// (spec.md §4.4: "computation in f32 even if storage is f16").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiVector {
    pub dim: u32,
    pub seq_len: u32,
    /// Row-major, length `seq_len * dim`.
    pub data: Vec<f32>,
}

impl MultiVector {
    pub fn new(dim: u32, seq_len: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), dim as usize * seq_len as usize);
        Self { dim, seq_len, data }
    }

    pub fn token(&self, i: usize) -> &[f32] {
        let d = self.dim as usize;
        &self.data[i * d..(i + 1) * d]
    }

    pub fn tokens(&self) -> impl Iterator<Item = &[f32]> {
        let d = self.dim as usize;
        self.data.chunks_exact(d)
    }

    pub fn is_empty(&self) -> bool {
        self.seq_len == 0
    }

    pub fn byte_len(&self, element_size: usize) -> usize {
        self.seq_len as usize * self.dim as usize * element_size
    }
}

/// A single pooled vector derived from a `MultiVector`, used for Stage-1 ANN
/// retrieval. Must be derived identically for queries and documents
/// (spec.md §3 "Derivation rule is fixed at deployment").
pub type RepresentativeVector = Vec<f32>;

/// The deterministic function mapping a `MultiVector` to its representative
/// vector. Fixed per deployment — changing it invalidates the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReprRule {
    /// The first token vector (CLS-equivalent).
    FirstToken,
    /// Element-wise max over all `seq_len` token vectors.
    MaxPool,
}

impl ReprRule {
    pub fn apply(self, mv: &MultiVector) -> RepresentativeVector {
        match self {
            ReprRule::FirstToken => mv.token(0).to_vec(),
            ReprRule::MaxPool => {
                let dim = mv.dim as usize;
                let mut out = vec![f32::NEG_INFINITY; dim];
                for tok in mv.tokens() {
                    for (o, v) in out.iter_mut().zip(tok.iter()) {
                        if *v > *o {
                            *o = *v;
                        }
                    }
                }
                out
            }
        }
    }
}

/// `kind` discriminator shared by records, collections, and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Visual,
    Text,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Visual => "visual",
            Kind::Text => "text",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable 128-bit identifier of a source document, content-hash derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocId(pub [u8; 16]);

impl DocId {
    pub fn from_content(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(bytes);
        let mut id = [0u8; 16];
        id.copy_from_slice(&digest[..16]);
        DocId(id)
    }

    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Globally unique record id, deterministic from `(doc_id, kind, ordinal)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn visual(doc_id: DocId, page: u32) -> Self {
        RecordId(format!("{doc_id}:v:{page}"))
    }

    pub fn text(doc_id: DocId, chunk_index: u32) -> Self {
        RecordId(format!("{doc_id}:t:{chunk_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scalar metadata value (spec.md §3 "flat mapping from string key to
/// scalar"). Nested containers are disallowed by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(f) => Some(*f),
            MetaValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Total ordering used by range/equality filters; `None` for
    /// incomparable scalar pairs (e.g. string vs. bool).
    pub fn partial_compare(&self, other: &MetaValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (MetaValue::Str(a), MetaValue::Str(b)) => Some(a.cmp(b)),
            (MetaValue::Bool(a), MetaValue::Bool(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

/// Flat attribute map. Ordered (`BTreeMap`) so serialized size and
/// iteration order are deterministic — needed for §4.2's size enforcement
/// and for reproducible test fixtures.
pub type Metadata = BTreeMap<String, MetaValue>;

/// One embedding record (a page or a text chunk), spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub doc_id: DocId,
    pub kind: Kind,
    pub representative: RepresentativeVector,
    /// Opaque, Codec-produced bytes (1-byte version tag + payload).
    pub full_compressed: Vec<u8>,
    pub metadata: Metadata,
}

/// Lifecycle state of a `Document` (spec.md §3 "Lifecycles").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Result of deleting a Document (spec.md §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub records_removed: usize,
}

/// Sort key for `list_documents` (spec.md §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSort {
    AddedDesc,
    NameAsc,
    PagesDesc,
}

impl Default for DocumentSort {
    fn default() -> Self {
        Self::AddedDesc
    }
}

/// One page of `list_documents` results (spec.md §6.2 `DocumentPage`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub total: usize,
}

/// The user-facing source file a Document represents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: DocId,
    pub filename: String,
    pub status: DocumentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub visual_count: usize,
    pub text_count: usize,
    pub failure_reason: Option<String>,
    pub retriable: Option<bool>,
    pub warnings: Vec<String>,
}
