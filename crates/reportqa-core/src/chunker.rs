//! Line-oriented chunking with overlap.
//!
//! Lines are packed greedily into a chunk until the next line would push it
//! past `max_len` (counted in characters, newline separators included). The
//! next chunk starts with the trailing whole lines of the previous one whose
//! joined length fits in `overlap`. A single line longer than `max_len` is
//! never cut and becomes an oversized chunk on its own.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

const SEPARATOR: char = '\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_len: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_len: 1000, overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_len == 0 {
            return Err(Error::InvalidConfiguration("chunk max_len must be greater than 0".into()));
        }
        if self.overlap >= self.max_len {
            return Err(Error::InvalidConfiguration(format!(
                "chunk overlap ({}) must be smaller than max_len ({})",
                self.overlap, self.max_len
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split one document. Empty lines are dropped; a document with no
    /// non-empty line yields no chunks.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let ChunkingConfig { max_len, overlap } = self.config;
        let mut spans: Vec<(String, usize)> = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        // Character length of `window` joined with separators.
        let mut total = 0usize;
        // Leading lines of `window` that were carried over from the last chunk.
        let mut carried = 0usize;

        for line in document.text.split(SEPARATOR).filter(|l| !l.is_empty()) {
            let len = line.chars().count();
            if !window.is_empty() && total + 1 + len > max_len {
                spans.push(emit(&window, carried));
                while let Some(front) = window.front() {
                    if total <= overlap && total + 1 + len <= max_len {
                        break;
                    }
                    let front_len = front.chars().count();
                    window.pop_front();
                    total = if window.is_empty() { 0 } else { total - front_len - 1 };
                }
                carried = window.len();
            }
            total = if window.is_empty() { len } else { total + 1 + len };
            window.push_back(line);
        }
        if !window.is_empty() {
            spans.push(emit(&window, carried));
        }

        let total_chunks = spans.len();
        spans
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (content, overlap_len))| {
                let chars = content.chars().count();
                if chars > max_len {
                    tracing::warn!(
                        doc = %document.section,
                        chunk_index,
                        len = chars,
                        max_len,
                        "line longer than max_len kept as a single chunk"
                    );
                }
                Chunk {
                    id: format!("{}:{}", document.section, chunk_index),
                    doc_id: document.section.clone(),
                    source_tag: document.source_tag.clone(),
                    content,
                    chunk_index,
                    total_chunks,
                    overlap_len,
                }
            })
            .collect()
    }

    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.split(d)).collect()
    }
}

/// Split with explicit parameters, validating them first.
pub fn split(document: &Document, max_len: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(ChunkingConfig { max_len, overlap })?.split(document))
}

fn emit(window: &VecDeque<&str>, carried: usize) -> (String, usize) {
    let content = window.iter().copied().collect::<Vec<_>>().join("\n");
    let overlap_len = if carried == 0 {
        0
    } else {
        window.iter().take(carried).map(|l| l.len()).sum::<usize>() + carried
    };
    (content, overlap_len)
}
