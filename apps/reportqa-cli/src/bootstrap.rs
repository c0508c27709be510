//! Settings loading and service construction shared by the binaries.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use reportqa_core::config::{Config, Settings};
use reportqa_core::report::JsonFileReport;
use reportqa_embed::get_default_embedder;
use reportqa_qa::{GeminiClient, QaService};

/// `.env` first, then defaults + config files + `APP_*` variables.
pub fn load_settings() -> Result<Settings> {
    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "loaded .env");
    }
    let settings = Config::load()?.settings()?;
    Ok(settings)
}

/// The configured report file, relative paths taken from the working directory.
pub fn report_source(settings: &Settings) -> Result<JsonFileReport> {
    let cwd = env::current_dir().context("cannot determine the working directory")?;
    Ok(JsonFileReport::new(settings.report_path(&cwd)))
}

/// Construct the service and run its build phase.
///
/// Missing credentials or an unloadable embedding model are errors. A build
/// failure is not: the service is returned in its `Failed` state and answers
/// every question with the initialization sentinel.
///
/// Must not be called from an async context, since the generation client
/// owns a blocking HTTP client.
pub fn build_service(settings: &Settings, show_progress: bool) -> Result<QaService> {
    let embedder = get_default_embedder(&settings.embedding)?;
    let generator = Arc::new(
        GeminiClient::from_settings(&settings.generation).context("cannot create the generation client")?,
    );
    let mut service = QaService::new(embedder, generator, settings)?.with_progress(show_progress);

    let source = report_source(settings)?;
    info!(report = %source.path().display(), "building index");
    match service.initialize(&source) {
        Ok(stats) => info!(documents = stats.documents, chunks = stats.chunks, "index built"),
        Err(e) => warn!(error = %e, "continuing without an index; questions will be answered with an error"),
    }
    Ok(service)
}
