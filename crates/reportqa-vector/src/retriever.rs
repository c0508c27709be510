use std::sync::Arc;

use reportqa_core::traits::Embedder;
use reportqa_core::{Error, Result};

use crate::index::VectorIndex;

/// Placed between retrieved texts in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Top-k retrieval over a built index.
///
/// There is no distance cutoff: up to `k` texts are always returned, and a
/// `k` larger than the index is clamped to the index size.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(Error::InvalidArgument("retrieval k must be greater than 0".into()));
        }
        Ok(Self { index, embedder, k })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Ranked texts for `question` using the configured `k`.
    pub fn retrieve_texts(&self, question: &str) -> Result<Vec<String>> {
        self.retrieve_texts_k(question, self.k)
    }

    pub fn retrieve_texts_k(&self, question: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(question, k)?
            .into_iter()
            .map(|(text, _)| text)
            .collect())
    }

    /// Ranked `(text, distance)` pairs, nearest first.
    pub fn search(&self, question: &str, k: usize) -> Result<Vec<(String, f32)>> {
        let vector = self
            .embedder
            .embed(question)
            .map_err(|e| Error::RetrievalFailure(format!("embedding the question failed: {}", e)))?;
        let hits = self.index.query(&vector, k).map_err(|e| match e {
            Error::InvalidArgument(_) => e,
            other => Error::RetrievalFailure(other.to_string()),
        })?;
        tracing::debug!(k, hits = hits.len(), "retrieved context");
        Ok(hits.into_iter().map(|h| (h.text.to_string(), h.distance)).collect())
    }

    /// The retrieved texts joined into one context block.
    pub fn retrieve(&self, question: &str) -> Result<String> {
        Ok(self.retrieve_texts(question)?.join(CONTEXT_SEPARATOR))
    }
}
