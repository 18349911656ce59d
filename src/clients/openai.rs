//! OpenAI-compatible chat completion client.
//!
//! Works against any vendor exposing the `/v1/chat/completions` wire format (OpenAI itself, or a
//! compatible proxy), since the orchestrator only needs native tool calling plus usage
//! accounting.

use async_trait::async_trait;
use std::error::Error;
use tokio::sync::Mutex;

use crate::client_wrapper::{ClientWrapper, Message, TokenUsage, ToolDefinition};
use crate::clients::common::{get_shared_http_client, ping_models_endpoint, send_with_native_tools};

pub struct OpenAIClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            usage: Mutex::new(None),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    async fn send_message(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        send_with_native_tools(
            &self.base_url,
            &self.api_key,
            &self.model,
            self.temperature,
            messages,
            tools,
            get_shared_http_client(),
            &self.usage,
        )
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.usage)
    }

    async fn ping(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        ping_models_endpoint(&self.base_url, &self.api_key, get_shared_http_client()).await
    }
}
