//! Daemon entry point: wires the six components together and serves the HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use paperpost::client_wrapper::ClientWrapper;
use paperpost::clients::openai::OpenAIClient;
use paperpost::clients::search::{HttpSearchClient, WebSearchClient};
use paperpost::config::Config;
use paperpost::governor::{ConcurrencyGovernor, RetryPolicy};
use paperpost::server::{build_router, AppState};
use paperpost::task_store::{RedisTaskStore, TaskStore};
use paperpost::tool_protocol::ToolRegistry;
use paperpost::tools::PaperPostTools;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let config = Config::from_env();
    let addr: SocketAddr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()).parse()?;

    let store: Arc<dyn TaskStore> = RedisTaskStore::new(config.store_url.as_deref());
    let governor = Arc::new(ConcurrencyGovernor::new(config.max_concurrent_generations, config.max_concurrent_verifications));

    let llm_client: Arc<dyn ClientWrapper> = Arc::new(OpenAIClient::new(config.llm_api_key.clone(), config.llm_model.clone(), config.llm_temperature));
    let search_client: Arc<dyn WebSearchClient> = Arc::new(HttpSearchClient::new(config.search_api_key.clone().unwrap_or_default()));

    let mut tools = ToolRegistry::empty();
    tools.add_protocol(Arc::new(PaperPostTools::new(search_client.clone()))).await?;
    let tools = Arc::new(tools);

    let shutdown = CancellationToken::new();

    let state = Arc::new(AppState {
        config,
        store,
        governor,
        llm_client,
        search_client,
        tools,
        retry_policy: RetryPolicy::default(),
        shutdown: shutdown.clone(),
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("paperpostd listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Waits for Ctrl+C, then cancels `shutdown` so in-flight jobs fail with `Cancelled` rather than
/// being silently abandoned (spec §9: background-task abstraction with graceful shutdown).
async fn shutdown_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        futures_util::future::pending::<()>().await;
    }
    log::info!("shutdown signal received, cancelling in-flight jobs");
    shutdown.cancel();
}
