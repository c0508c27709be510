use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use reportqa_core::chunker::Chunker;
use reportqa_core::report::{Report, ReportSerializer};
use reportqa_core::traits::Embedder;
use reportqa_core::types::{DistanceMetric, EmbeddedChunk};
use reportqa_core::{Error, Result};

use crate::index::VectorIndex;

/// Chunks sent to the embedder per call.
pub const DEFAULT_EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub documents: usize,
    pub chunks: usize,
    pub dim: usize,
}

/// Runs the build phase: serialize → chunk → embed → index.
pub struct IndexBuilder {
    serializer: ReportSerializer,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    metric: DistanceMetric,
    batch_size: usize,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(serializer: ReportSerializer, chunker: Chunker, embedder: Arc<dyn Embedder>) -> Self {
        Self { serializer, chunker, embedder, metric: DistanceMetric::default(), batch_size: DEFAULT_EMBED_BATCH, show_progress: false }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Texts per `embed_batch` call; values below 1 are raised to 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Draw a progress bar on stderr while embedding.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build the index. Chunks are embedded in batches; the first failed
    /// batch aborts the whole build and a partial index is never returned.
    pub fn build(&self, report: &Report) -> Result<(VectorIndex, BuildStats)> {
        let documents = self.serializer.serialize(report);
        tracing::info!(documents = documents.len(), "serialized report");
        let chunks = self.chunker.split_all(&documents);
        tracing::info!(chunks = chunks.len(), "split documents into chunks");
        if chunks.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let dim = self.embedder.dim();
        let pb = if self.show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message("Embedding chunks");

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = match self.embedder.embed_batch(&texts) {
                Ok(v) => v,
                Err(e) => {
                    let first = &batch[0].id;
                    pb.abandon_with_message(format!("embedding failed in batch starting at {first}"));
                    tracing::error!(batch_start = %first, error = %e, "embedding failed; aborting build");
                    return Err(match e {
                        Error::EmbeddingFailure(_) => e,
                        other => Error::EmbeddingFailure(format!("{first}: {other}")),
                    });
                }
            };
            if vectors.len() != texts.len() {
                pb.abandon();
                return Err(Error::EmbeddingFailure(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                pb.abandon();
                return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
            }
            entries.extend(vectors.into_iter().zip(texts).map(|(vector, text)| EmbeddedChunk { vector, text }));
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("Embedding completed");

        let index = VectorIndex::build(entries, self.metric)?;
        let stats = BuildStats { documents: documents.len(), chunks: index.len(), dim };
        tracing::info!(chunks = stats.chunks, dim, model = self.embedder.model_id(), "vector index ready");
        Ok((index, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportqa_core::chunker::ChunkingConfig;

    struct ConstEmbedder(usize);

    impl Embedder for ConstEmbedder {
        fn model_id(&self) -> &str { "const" }
        fn dim(&self) -> usize { self.0 }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> { Ok(vec![1.0; 2]) }
    }

    /// Records the size of every batch it is handed.
    struct BatchRecorder(std::sync::Mutex<Vec<usize>>);

    impl Embedder for BatchRecorder {
        fn model_id(&self) -> &str { "recorder" }
        fn dim(&self) -> usize { 1 }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> { Ok(vec![0.5]) }
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.0.lock().unwrap().push(texts.len());
            Ok(vec![vec![0.5]; texts.len()])
        }
    }

    struct ShortBatch;

    impl Embedder for ShortBatch {
        fn model_id(&self) -> &str { "short" }
        fn dim(&self) -> usize { 1 }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> { Ok(vec![0.5]) }
        fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(vec![vec![0.5]]) }
    }

    fn five_sections() -> Report {
        let mut report = Report::new();
        for name in ["a", "b", "c", "d", "e"] {
            report.insert(name, &1);
        }
        report
    }

    #[test]
    fn chunks_are_embedded_in_batches() {
        let recorder = Arc::new(BatchRecorder(std::sync::Mutex::new(Vec::new())));
        let builder = IndexBuilder::new(
            ReportSerializer::default(),
            Chunker::new(ChunkingConfig::default()).unwrap(),
            recorder.clone(),
        )
        .with_batch_size(2);
        let (index, stats) = builder.build(&five_sections()).unwrap();
        assert_eq!(stats.chunks, 5);
        assert_eq!(index.len(), 5);
        assert_eq!(*recorder.0.lock().unwrap(), [2, 2, 1]);
    }

    #[test]
    fn short_batch_result_is_an_embedding_failure() {
        let builder = IndexBuilder::new(
            ReportSerializer::default(),
            Chunker::new(ChunkingConfig::default()).unwrap(),
            Arc::new(ShortBatch),
        )
        .with_batch_size(3);
        assert!(matches!(builder.build(&five_sections()), Err(Error::EmbeddingFailure(_))));
    }

    #[test]
    fn embedder_dim_disagreement_is_reported() {
        let mut report = Report::new();
        report.insert("s", &1);
        let builder = IndexBuilder::new(
            ReportSerializer::default(),
            Chunker::new(ChunkingConfig::default()).unwrap(),
            Arc::new(ConstEmbedder(3)),
        );
        assert!(matches!(builder.build(&report), Err(Error::DimensionMismatch { expected: 3, actual: 2 })));
    }
}
