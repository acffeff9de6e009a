//! QueryProcessor (spec.md §4.5): validates raw query text and turns it
//! into both a full multi-vector (for Stage-2 MaxSim) and a representative
//! vector (for Stage-1 ANN), using the same `ReprRule` ingestion used.

use crate::capability::Embedder;
use crate::error::QueryError;
use crate::types::{MultiVector, ReprRule};

pub const MAX_QUERY_CHARS: usize = 1000;

pub struct QueryProcessor {
    pub repr_rule: ReprRule,
    pub max_chars: usize,
}

impl QueryProcessor {
    pub fn new(repr_rule: ReprRule) -> Self {
        Self {
            repr_rule,
            max_chars: MAX_QUERY_CHARS,
        }
    }

    /// Normalizes whitespace, rejects empty/too-long input, embeds via the
    /// caller's `Embedder`, and derives the representative vector.
    pub fn process(
        &self,
        raw: &str,
        embedder: &dyn Embedder,
    ) -> Result<(MultiVector, Vec<f32>), QueryError> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return Err(QueryError::Empty);
        }
        if normalized.chars().count() > self.max_chars {
            return Err(QueryError::TooLong(self.max_chars));
        }

        let mv = embedder
            .embed_query(&normalized)
            .map_err(|e| QueryError::EmbeddingFailure(e.to_string()))?;
        let repr = self.repr_rule.apply(&mv);
        Ok((mv, repr))
    }
}
