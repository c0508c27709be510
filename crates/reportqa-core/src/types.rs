//! Domain types passed between the build and query phases.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Distance used to rank index entries. Fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    /// `1 - cosine similarity`, in `[0, 2]`.
    Cosine,
}

/// One serialized report section.
///
/// `text` is `"<section>: <json>"`. `source_tag` records provenance and is
/// never used for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub section: String,
    pub text: String,
    pub source_tag: String,
}

/// A bounded span of a [`Document`], the unit of retrieval.
///
/// - `id`: `<section>:<chunk_index>`
/// - `doc_id`: section name of the parent document
/// - `content`: the text payload, always on line boundaries
/// - `chunk_index`/`total_chunks`: position within the parent document
/// - `overlap_len`: byte length of the prefix carried over from the previous
///   chunk, including the joining newline (0 for the first chunk)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub source_tag: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub overlap_len: usize,
}

impl Chunk {
    /// The part of `content` that did not appear in the previous chunk.
    pub fn fresh_content(&self) -> &str {
        self.content.get(self.overlap_len..).unwrap_or_default()
    }
}

/// A chunk paired with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub vector: Vec<f32>,
    pub text: String,
}

/// Everything produced while answering one question. Never shared across
/// requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryContext {
    pub question: String,
    pub retrieved_texts: Vec<String>,
    pub prompt: String,
    pub answer: String,
}
