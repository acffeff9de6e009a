//! ResultRanker (spec.md §4.7): per-collection min-max score normalization,
//! cross-collection merge, and dedup-by-doc_id with supporting hits.

use std::collections::HashMap;

use crate::metadata;
use crate::types::{DocId, Kind, Metadata, RecordId};

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub record_id: RecordId,
    pub doc_id: DocId,
    pub kind: Kind,
    /// Raw MaxSim (or Stage-1 cosine, if Stage-2 was skipped) score.
    pub raw_score: f32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct SupportingHit {
    pub record_id: RecordId,
    pub kind: Kind,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub record_id: RecordId,
    pub kind: Kind,
    pub score: f32,
    pub raw_score: f32,
    pub metadata: Metadata,
    pub highlight: Option<String>,
    pub supporting_hits: Vec<SupportingHit>,
}

pub struct ResultRanker;

impl ResultRanker {
    /// Min-max normalizes scores within each collection's own candidate
    /// set (spec.md §4.7 fixes this choice over z-score), merges across
    /// collections, deduplicates by `doc_id` keeping the highest-scored
    /// hit, and truncates to `n_results`.
    pub fn rank(
        per_collection: Vec<(Kind, Vec<ScoredCandidate>)>,
        n_results: usize,
    ) -> Vec<SearchResult> {
        let mut normalized: Vec<(ScoredCandidate, f32)> = Vec::new();
        for (_, candidates) in per_collection {
            normalized.extend(Self::min_max_normalize(candidates));
        }

        // Sort by normalized score desc, record id asc as tie-break.
        normalized.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.record_id.cmp(&b.0.record_id))
        });

        let mut by_doc: HashMap<DocId, SearchResult> = HashMap::new();
        let mut doc_order: Vec<DocId> = Vec::new();

        for (candidate, score) in normalized {
            match by_doc.get_mut(&candidate.doc_id) {
                Some(existing) => {
                    existing.supporting_hits.push(SupportingHit {
                        record_id: candidate.record_id,
                        kind: candidate.kind,
                        score,
                    });
                }
                None => {
                    doc_order.push(candidate.doc_id);
                    let (metadata, highlight) = metadata::to_output(candidate.metadata);
                    by_doc.insert(
                        candidate.doc_id,
                        SearchResult {
                            doc_id: candidate.doc_id,
                            record_id: candidate.record_id,
                            kind: candidate.kind,
                            score,
                            raw_score: candidate.raw_score,
                            metadata,
                            highlight,
                            supporting_hits: Vec::new(),
                        },
                    );
                }
            }
        }

        doc_order
            .into_iter()
            .filter_map(|id| by_doc.remove(&id))
            .take(n_results)
            .collect()
    }

    fn min_max_normalize(candidates: Vec<ScoredCandidate>) -> Vec<(ScoredCandidate, f32)> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let min = candidates
            .iter()
            .map(|c| c.raw_score)
            .fold(f32::INFINITY, f32::min);
        let max = candidates
            .iter()
            .map(|c| c.raw_score)
            .fold(f32::NEG_INFINITY, f32::max);

        let spread = max - min;
        candidates
            .into_iter()
            .map(|c| {
                let normalized = if spread.abs() < 1e-9 {
                    1.0
                } else {
                    (c.raw_score - min) / spread
                };
                (c, normalized)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_metadata() -> Metadata {
        std::collections::BTreeMap::new()
    }

    fn candidate(doc: &str, record: &str, score: f32) -> ScoredCandidate {
        ScoredCandidate {
            record_id: RecordId(record.to_string()),
            doc_id: DocId::from_content(doc.as_bytes()),
            kind: Kind::Visual,
            raw_score: score,
            metadata: dummy_metadata(),
        }
    }

    #[test]
    fn dedups_by_doc_keeping_highest() {
        let candidates = vec![
            (
                Kind::Visual,
                vec![candidate("doc-a", "doc-a:v:0", 0.9), candidate("doc-a", "doc-a:v:1", 0.2)],
            ),
        ];
        let results = ResultRanker::rank(candidates, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record_id.as_str(), "doc-a:v:0");
        assert_eq!(results[0].supporting_hits.len(), 1);
    }

    #[test]
    fn single_candidate_normalizes_to_one() {
        let candidates = vec![(Kind::Visual, vec![candidate("doc-a", "doc-a:v:0", 0.42)])];
        let results = ResultRanker::rank(candidates, 10);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn truncates_to_n_results() {
        let candidates = vec![(
            Kind::Visual,
            vec![
                candidate("doc-a", "doc-a:v:0", 0.9),
                candidate("doc-b", "doc-b:v:0", 0.8),
                candidate("doc-c", "doc-c:v:0", 0.1),
            ],
        )];
        let results = ResultRanker::rank(candidates, 2);
        assert_eq!(results.len(), 2);
    }
}
