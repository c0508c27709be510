//! Question answering over the report: prompt assembly, the Gemini generation
//! backend and the service that ties retrieval and generation together.

pub mod gemini;
pub mod prompt;
pub mod service;

pub use gemini::GeminiClient;
pub use prompt::{PromptTemplate, DEFAULT_TEMPLATE};
pub use service::{QaService, QueryError, ServiceState, INIT_FAILED_ANSWER, QUERY_ERROR_PREFIX};
