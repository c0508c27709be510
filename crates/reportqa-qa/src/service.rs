//! The question-answering service.
//!
//! Lifecycle: construct with [`QaService::new`], build once with
//! [`QaService::initialize`], then call [`QaService::ask`] from any number of
//! threads. The index is immutable after the build, so concurrent queries need
//! no locking.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use reportqa_core::chunker::{Chunker, ChunkingConfig};
use reportqa_core::config::Settings;
use reportqa_core::report::ReportSerializer;
use reportqa_core::traits::{Embedder, GenerationClient, ReportSource};
use reportqa_core::types::{DistanceMetric, QueryContext};
use reportqa_core::{Error, GenerationError, Result};
use reportqa_vector::{BuildStats, IndexBuilder, Retriever, CONTEXT_SEPARATOR};

use crate::prompt::PromptTemplate;

/// Returned by [`QaService::ask`] whenever the service is not `Ready`.
pub const INIT_FAILED_ANSWER: &str =
    "Error: question answering is unavailable because the index failed to initialize.";

/// Prefix of every per-query failure returned by [`QaService::ask`].
pub const QUERY_ERROR_PREFIX: &str = "Error during query: ";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("the service is not ready")]
    NotReady,

    #[error("{0}")]
    Retrieval(#[source] Error),

    #[error("{0}")]
    Generation(#[source] GenerationError),

    #[error("backend panicked: {0}")]
    Panicked(String),
}

impl QueryError {
    /// Whether retrying the same question may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Generation(e) if e.is_transient())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Ready,
    /// Initialization failed; the message names the cause.
    Failed(String),
}

struct Pipeline {
    retriever: Retriever,
    prompt: PromptTemplate,
    generator: Arc<dyn GenerationClient>,
}

impl Pipeline {
    fn run(&self, question: &str) -> std::result::Result<QueryContext, QueryError> {
        debug!(stage = "retrieving", k = self.retriever.k());
        let retrieved_texts = self.retriever.retrieve_texts(question).map_err(QueryError::Retrieval)?;
        let context = retrieved_texts.join(CONTEXT_SEPARATOR);
        let prompt = self.prompt.assemble(&context, question);

        debug!(stage = "generating", retrieved = retrieved_texts.len(), prompt_len = prompt.len());
        let answer = self.generator.generate(&prompt).map_err(QueryError::Generation)?;
        debug!(stage = "answered", answer_len = answer.len());

        Ok(QueryContext {
            question: question.to_string(),
            retrieved_texts,
            prompt,
            answer,
        })
    }
}

enum State {
    Uninitialized,
    Ready(Pipeline),
    Failed(String),
}

pub struct QaService {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn GenerationClient>,
    prompt: PromptTemplate,
    serializer: ReportSerializer,
    chunking: ChunkingConfig,
    metric: DistanceMetric,
    k: usize,
    show_progress: bool,
    state: State,
}

impl std::fmt::Debug for QaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaService")
            .field("embedder", &self.embedder.model_id())
            .field("generator", &self.generator.model_id())
            .field("k", &self.k)
            .field("metric", &self.metric)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl QaService {
    /// Validates `settings` and the prompt template; no build work happens here.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn GenerationClient>,
        settings: &Settings,
    ) -> Result<Self> {
        settings.validate()?;
        let prompt = match &settings.prompt.template {
            Some(template) => PromptTemplate::parse(template)?,
            None => PromptTemplate::default(),
        };
        Ok(Self {
            embedder,
            generator,
            prompt,
            serializer: ReportSerializer::new(settings.report.source_tag.clone()),
            chunking: settings.chunking,
            metric: settings.retrieval.metric,
            k: settings.retrieval.k,
            show_progress: false,
            state: State::Uninitialized,
        })
    }

    /// Show a progress bar while embedding during [`initialize`](Self::initialize).
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run the build phase: load → serialize → chunk → embed → index.
    ///
    /// Allowed once, from `Uninitialized`. Any failure, including a panic in
    /// the embedder or the report source, moves the service to `Failed`
    /// permanently and is returned as `InitializationFailure`.
    pub fn initialize(&mut self, source: &dyn ReportSource) -> Result<BuildStats> {
        if !matches!(self.state, State::Uninitialized) {
            return Err(Error::InvalidArgument("the service has already been initialized".into()));
        }
        info!(
            embedder = self.embedder.model_id(),
            generator = self.generator.model_id(),
            k = self.k,
            "initializing question answering service"
        );
        let built = panic::catch_unwind(AssertUnwindSafe(|| self.build(source)))
            .unwrap_or_else(|payload| Err(Error::BackendPanicked(panic_message(payload.as_ref()))));
        match built {
            Ok((pipeline, stats)) => {
                info!(documents = stats.documents, chunks = stats.chunks, dim = stats.dim, "service ready");
                self.state = State::Ready(pipeline);
                Ok(stats)
            }
            Err(e) => {
                error!(error = %e, "initialization failed");
                self.state = State::Failed(e.to_string());
                Err(Error::InitializationFailure(Box::new(e)))
            }
        }
    }

    fn build(&self, source: &dyn ReportSource) -> Result<(Pipeline, BuildStats)> {
        let report = source.load()?;
        let chunker = Chunker::new(self.chunking)?;
        let (index, stats) = IndexBuilder::new(self.serializer.clone(), chunker, self.embedder.clone())
            .with_metric(self.metric)
            .with_progress(self.show_progress)
            .build(&report)?;
        let retriever = Retriever::new(Arc::new(index), self.embedder.clone(), self.k)?;
        Ok((
            Pipeline { retriever, prompt: self.prompt.clone(), generator: self.generator.clone() },
            stats,
        ))
    }

    pub fn state(&self) -> ServiceState {
        match &self.state {
            State::Uninitialized => ServiceState::Uninitialized,
            State::Ready(_) => ServiceState::Ready,
            State::Failed(cause) => ServiceState::Failed(cause.clone()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Answer `question`, keeping every intermediate value.
    ///
    /// Panics raised by the injected backends are caught and returned as
    /// [`QueryError::Panicked`].
    pub fn ask_detailed(&self, question: &str) -> std::result::Result<QueryContext, QueryError> {
        let State::Ready(pipeline) = &self.state else {
            return Err(QueryError::NotReady);
        };
        panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(question)))
            .unwrap_or_else(|payload| Err(QueryError::Panicked(panic_message(payload.as_ref()))))
    }

    /// Answer `question`. Never fails: errors come back as text starting with
    /// `Error`, either [`INIT_FAILED_ANSWER`] or [`QUERY_ERROR_PREFIX`] plus the
    /// cause.
    pub fn ask(&self, question: &str) -> String {
        match self.ask_detailed(question) {
            Ok(ctx) => ctx.answer,
            Err(QueryError::NotReady) => INIT_FAILED_ANSWER.to_string(),
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "query failed");
                format!("{QUERY_ERROR_PREFIX}{e}")
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        let caught = panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom 1");
        let caught = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "static");
    }

    #[test]
    fn only_transient_generation_errors_are_retryable() {
        assert!(QueryError::Generation(GenerationError::Transient("t".into())).is_transient());
        assert!(!QueryError::Generation(GenerationError::Terminal("t".into())).is_transient());
        assert!(!QueryError::Panicked("p".into()).is_transient());
        assert!(!QueryError::Retrieval(Error::EmptyIndex).is_transient());
    }

    #[test]
    fn debug_output_names_backends_and_state() {
        struct Fixed;
        impl Embedder for Fixed {
            fn model_id(&self) -> &str { "fixed-embedder" }
            fn dim(&self) -> usize { 2 }
            fn embed(&self, _text: &str) -> Result<Vec<f32>> { Ok(vec![1.0, 0.0]) }
        }
        struct Silent;
        impl GenerationClient for Silent {
            fn model_id(&self) -> &str { "silent-generator" }
            fn generate(&self, _prompt: &str) -> std::result::Result<String, GenerationError> { Ok(String::new()) }
        }
        let service = QaService::new(Arc::new(Fixed), Arc::new(Silent), &Settings::default()).unwrap();
        let out = format!("{service:?}");
        assert!(out.contains("fixed-embedder"));
        assert!(out.contains("silent-generator"));
        assert!(out.contains("Uninitialized"));
    }

    #[test]
    fn service_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QaService>();
    }
}
