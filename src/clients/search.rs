//! Web search collaborator used by the `web_search` tool.

use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error;

use crate::clients::common::get_shared_http_client;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Abstraction over a search provider so tests can stub deterministic results without a network
/// call, the same way [`crate::client_wrapper::ClientWrapper`] decouples the orchestrator from a
/// specific LLM vendor.
#[async_trait]
pub trait WebSearchClient: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, Box<dyn Error + Send + Sync>>;

    /// Cheap reachability probe for `/health`. Default issues a minimal real search; providers
    /// with a lighter endpoint may override.
    async fn ping(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.search("ping", 1).await.map(|_| ())
    }
}

#[derive(Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    results: Vec<ProviderResult>,
}

#[derive(Deserialize)]
struct ProviderResult {
    title: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

pub struct HttpSearchClient {
    api_key: String,
    base_url: String,
}

impl HttpSearchClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.search.brave.com/res/v1/web/search".to_string(),
        }
    }
}

#[async_trait]
impl WebSearchClient for HttpSearchClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, Box<dyn Error + Send + Sync>> {
        let resp = get_shared_http_client()
            .get(&self.base_url)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", &max_results.to_string())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(format!("web search provider returned HTTP {}", resp.status()).into());
        }

        let parsed: ProviderResponse = resp.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult { title: r.title, url: r.url, snippet: r.snippet })
            .collect())
    }
}
