//! Shared application state handed to every axum handler.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::clients::search::WebSearchClient;
use crate::client_wrapper::ClientWrapper;
use crate::config::Config;
use crate::governor::{ConcurrencyGovernor, RetryPolicy};
use crate::task_store::TaskStore;
use crate::tool_protocol::ToolRegistry;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TaskStore>,
    pub governor: Arc<ConcurrencyGovernor>,
    pub llm_client: Arc<dyn ClientWrapper>,
    pub search_client: Arc<dyn WebSearchClient>,
    pub tools: Arc<ToolRegistry>,
    pub retry_policy: RetryPolicy,
    /// Cancelled on graceful shutdown; propagated into every in-flight job.
    pub shutdown: CancellationToken,
}
