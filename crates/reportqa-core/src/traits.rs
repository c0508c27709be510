use crate::error::{GenerationError, Result};
use crate::report::Report;

/// Maps text to a fixed-dimension vector.
///
/// Implementations must return vectors of length [`Embedder::dim`] for every
/// input and should be deterministic for identical input.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the underlying model.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Turns a rendered prompt into generated text.
pub trait GenerationClient: Send + Sync {
    fn model_id(&self) -> &str;
    fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError>;
}

/// Produces the analytics report the index is built from.
pub trait ReportSource: Send + Sync {
    fn load(&self) -> Result<Report>;
}
