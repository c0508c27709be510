use std::sync::Arc;

use reportqa_cli::{bootstrap, logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let settings = bootstrap::load_settings()?;
    let bind = settings.server.bind.clone();

    // The generation client is blocking and must be created off the runtime.
    let service = tokio::task::spawn_blocking(move || bootstrap::build_service(&settings, false)).await??;
    let ready = service.is_ready();
    let app = server::router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, ready, "reportqa-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
