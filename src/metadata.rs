//! Metadata schema validation (spec.md §4.2): reserved keys, scalar-only
//! values, and a serialized-size cap.

use crate::error::ValidationError;
use crate::types::{Kind, MetaValue, Metadata};

pub const DEFAULT_MAX_METADATA_BYTES: usize = 50 * 1024;

/// Keys the engine writes itself; callers may not set or override them.
pub const RESERVED_KEYS: &[&str] = &[
    "doc_id",
    "kind",
    "filename",
    "page",
    "chunk_index",
    "added_at",
    "excerpt",
];

/// Validates caller-supplied metadata against the reserved-key contract
/// and the size cap. `max_bytes` is passed in rather than hardcoded so
/// tests and `EngineConfig` can both drive it.
pub fn validate(metadata: &Metadata, max_bytes: usize) -> Result<(), ValidationError> {
    for key in metadata.keys() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(ValidationError::ReservedKey(key.clone()));
        }
    }
    let size = serialized_size(metadata);
    if size > max_bytes {
        return Err(ValidationError::TooLarge {
            actual: size,
            limit: max_bytes,
        });
    }
    Ok(())
}

/// Estimated on-disk size of a metadata map: JSON-encoded byte length.
/// `MetaValue` only has scalar variants, so this can never diverge from
/// "flat map of scalars" by construction — there's no nested-container
/// case to reject once the type system rules it out.
pub fn serialized_size(metadata: &Metadata) -> usize {
    serde_json::to_vec(metadata).map(|v| v.len()).unwrap_or(0)
}

/// Stamps engine-owned reserved keys onto a metadata map before storage
/// (spec.md §3 invariant I3: `metadata.doc_id == doc_id`). `ordinal` is the
/// page index (visual, 1-indexed per the `page` contract) or chunk index
/// (text, 0-indexed); validation already rejected callers setting any of
/// these keys themselves. `excerpt` backs the optional per-result
/// `highlight` (spec.md §4.7 output fields), text chunks only.
pub fn with_system_fields(
    mut metadata: Metadata,
    doc_id: &str,
    kind: Kind,
    filename: &str,
    ordinal: u32,
    added_at: chrono::DateTime<chrono::Utc>,
    excerpt: Option<&str>,
) -> Metadata {
    metadata.insert("doc_id".to_string(), MetaValue::Str(doc_id.to_string()));
    metadata.insert("kind".to_string(), MetaValue::Str(kind.as_str().to_string()));
    metadata.insert("filename".to_string(), MetaValue::Str(filename.to_string()));
    match kind {
        Kind::Visual => {
            metadata.insert("page".to_string(), MetaValue::Int((ordinal + 1) as i64));
        }
        Kind::Text => {
            metadata.insert("chunk_index".to_string(), MetaValue::Int(ordinal as i64));
        }
    }
    metadata.insert("added_at".to_string(), MetaValue::Int(added_at.timestamp()));
    if let Some(excerpt) = excerpt {
        metadata.insert("excerpt".to_string(), MetaValue::Str(excerpt.to_string()));
    }
    metadata
}

/// Keys dropped from a record's internal metadata before it's surfaced in
/// a `SearchResult` (spec.md §4.7: "filtered to non-reserved keys plus
/// `filename`, `page|chunk_index`"). `excerpt` is promoted to the result's
/// `highlight` field instead of staying in `metadata`.
const OUTPUT_DROPPED_KEYS: &[&str] = &["doc_id", "kind", "added_at"];

/// Splits a stored record's metadata into what a caller sees
/// (`metadata`, `highlight`): drops internal-only reserved keys, pulls
/// `excerpt` out as the highlight.
pub fn to_output(mut metadata: Metadata) -> (Metadata, Option<String>) {
    let highlight = metadata
        .remove("excerpt")
        .and_then(|v| v.as_str().map(|s| s.to_string()));
    for key in OUTPUT_DROPPED_KEYS {
        metadata.remove(*key);
    }
    (metadata, highlight)
}
