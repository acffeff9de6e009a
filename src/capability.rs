//! Out-of-scope external collaborators (spec.md §6.3), reachable only
//! through these narrow traits. This crate ships mock implementations for
//! tests and the demo binary; real embedding/parsing lives outside it.

use std::collections::BTreeMap;

use crate::types::{MetaValue, MultiVector};

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
    #[error("input rejected by embedding backend: {0}")]
    InvalidInput(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("parser backend unavailable: {0}")]
    Unavailable(String),
    #[error("file could not be parsed: {0}")]
    Malformed(String),
}

/// Produces multi-vector embeddings for page images, text chunks, and
/// queries. The derivation of a representative vector from the returned
/// `MultiVector` is the caller's (`ReprRule`'s) responsibility, not this
/// trait's — embedders only ever return full token sequences.
pub trait Embedder: Send + Sync {
    fn embed_image(&self, bytes: &[u8]) -> Result<MultiVector, EmbeddingError>;
    fn embed_text(&self, text: &str) -> Result<MultiVector, EmbeddingError>;
    fn embed_query(&self, text: &str) -> Result<MultiVector, EmbeddingError>;
}

pub struct PageImage {
    pub page_index: u32,
    pub bytes: Vec<u8>,
}

pub struct TextChunk {
    pub chunk_index: u32,
    pub text: String,
}

pub struct ParsedDocument {
    pub pages: Vec<PageImage>,
    pub chunks: Vec<TextChunk>,
    pub doc_meta: BTreeMap<String, MetaValue>,
}

/// Splits a source file into page images (for visual embedding) and text
/// chunks (for text embedding).
pub trait Parser: Send + Sync {
    fn parse(&self, filename: &str, bytes: &[u8]) -> Result<ParsedDocument, ParseError>;
}

/// Deterministic embedder for tests/demo: hashes input bytes into a fixed
/// dimension, no real semantics. Sequence length is derived from input
/// size so MaxSim still has more than one token to work with.
pub struct MockEmbedder {
    pub dim: u32,
}

impl MockEmbedder {
    pub fn new(dim: u32) -> Self {
        Self { dim }
    }

    fn hash_embed(&self, bytes: &[u8], seq_len: u32) -> MultiVector {
        use sha2::{Digest, Sha256};
        let dim = self.dim as usize;
        let mut data = Vec::with_capacity(dim * seq_len as usize);
        for tok in 0..seq_len {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hasher.update(tok.to_le_bytes());
            let digest = hasher.finalize();
            let mut vec: Vec<f32> = (0..dim)
                .map(|i| {
                    let b = digest[i % digest.len()] as f32;
                    (b / 127.5) - 1.0
                })
                .collect();
            let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
            for v in &mut vec {
                *v /= norm;
            }
            data.extend(vec);
        }
        MultiVector::new(self.dim, seq_len, data)
    }
}

impl Embedder for MockEmbedder {
    fn embed_image(&self, bytes: &[u8]) -> Result<MultiVector, EmbeddingError> {
        if bytes.is_empty() {
            return Err(EmbeddingError::InvalidInput("empty image".into()));
        }
        Ok(self.hash_embed(bytes, 16))
    }

    fn embed_text(&self, text: &str) -> Result<MultiVector, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("empty text".into()));
        }
        let seq_len = (text.split_whitespace().count() as u32).clamp(1, 32);
        Ok(self.hash_embed(text.as_bytes(), seq_len))
    }

    fn embed_query(&self, text: &str) -> Result<MultiVector, EmbeddingError> {
        self.embed_text(text)
    }
}

/// Splits plain-text input into one page (the whole thing, as a visual
/// stand-in) and whitespace-delimited chunks of up to `chunk_words` words.
pub struct MockParser {
    pub chunk_words: usize,
}

impl MockParser {
    pub fn new(chunk_words: usize) -> Self {
        Self { chunk_words }
    }
}

impl Parser for MockParser {
    fn parse(&self, _filename: &str, bytes: &[u8]) -> Result<ParsedDocument, ParseError> {
        let text = String::from_utf8_lossy(bytes).to_string();
        if text.trim().is_empty() {
            return Err(ParseError::Malformed("empty content".into()));
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let chunks = words
            .chunks(self.chunk_words.max(1))
            .enumerate()
            .map(|(i, words)| TextChunk {
                chunk_index: i as u32,
                text: words.join(" "),
            })
            .collect();

        let pages = vec![PageImage {
            page_index: 0,
            bytes: bytes.to_vec(),
        }];

        Ok(ParsedDocument {
            pages,
            chunks,
            doc_meta: BTreeMap::new(),
        })
    }
}
