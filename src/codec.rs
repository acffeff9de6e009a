//! Compressed encoding of a `MultiVector` into an opaque byte blob
//! (spec.md §4.1). Layout: `[version:u8][dim:u32 LE][seq_len:u32 LE][deflate(f16 bytes)]`.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use half::f16;

use crate::error::CodecError;
use crate::types::MultiVector;

pub const CODEC_VERSION: u8 = 1;

/// Largest multi-vector this codec will attempt to encode, in raw f16
/// bytes before compression. Guards against pathological parser output.
pub const MAX_RAW_BYTES: usize = 2 * 1024 * 1024;

const HEADER_LEN: usize = 1 + 4 + 4;

pub fn compress(mv: &MultiVector) -> Result<Vec<u8>, CodecError> {
    if mv.is_empty() {
        return Err(CodecError::CorruptEmbedding);
    }
    let raw_len = mv.byte_len(2);
    if raw_len > MAX_RAW_BYTES {
        return Err(CodecError::EmbeddingTooLarge(raw_len));
    }

    let mut raw = Vec::with_capacity(raw_len);
    for v in &mv.data {
        raw.extend_from_slice(&f16::from_f32(*v).to_le_bytes());
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .map_err(|_| CodecError::CorruptEmbedding)?;
    let deflated = encoder.finish().map_err(|_| CodecError::CorruptEmbedding)?;

    let mut out = Vec::with_capacity(HEADER_LEN + deflated.len());
    out.push(CODEC_VERSION);
    out.extend_from_slice(&mv.dim.to_le_bytes());
    out.extend_from_slice(&mv.seq_len.to_le_bytes());
    out.extend_from_slice(&deflated);
    Ok(out)
}

pub fn decompress(bytes: &[u8]) -> Result<MultiVector, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::Truncated);
    }
    let version = bytes[0];
    if version != CODEC_VERSION {
        return Err(CodecError::UnsupportedCodec(version));
    }
    let dim = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
    let seq_len = u32::from_le_bytes(bytes[5..9].try_into().unwrap());
    if dim == 0 || seq_len == 0 {
        return Err(CodecError::CorruptEmbedding);
    }

    let mut decoder = DeflateDecoder::new(&bytes[HEADER_LEN..]);
    let expected_raw = dim as usize * seq_len as usize * 2;
    let mut raw = Vec::with_capacity(expected_raw);
    decoder
        .read_to_end(&mut raw)
        .map_err(|_| CodecError::Truncated)?;
    if raw.len() != expected_raw {
        return Err(CodecError::Truncated);
    }

    let mut data = Vec::with_capacity(dim as usize * seq_len as usize);
    for chunk in raw.chunks_exact(2) {
        let bits = u16::from_le_bytes([chunk[0], chunk[1]]);
        data.push(f16::from_bits(bits).to_f32());
    }
    Ok(MultiVector::new(dim, seq_len, data))
}
