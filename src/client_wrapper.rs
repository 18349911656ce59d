//! Provider-agnostic LLM client abstraction.
//!
//! Application code talks to language models exclusively through the [`ClientWrapper`] trait so
//! that [`crate::agent_runtime::AgentRuntime`] never has to know which vendor is behind it.

use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A single tool call returned by the LLM in a native function-calling response.
#[derive(Debug, Clone)]
pub struct NativeToolCall {
    /// Provider-assigned call ID, correlated back via `Role::Tool { call_id }`.
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Provider-agnostic tool schema passed alongside a chat request.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// The role a [`Message`] was authored under.
#[derive(Debug, Clone)]
pub enum Role {
    System,
    User,
    Assistant,
    /// A tool-result message correlating with a prior assistant [`NativeToolCall`].
    Tool { call_id: String },
}

/// Token accounting for a single request/response round trip.
#[derive(Clone, Debug)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// A single message in a chat history.
#[derive(Clone)]
pub struct Message {
    pub role: Role,
    pub content: Arc<str>,
    /// Native tool calls requested by the assistant. Empty for every other message kind.
    pub tool_calls: Vec<NativeToolCall>,
}

impl Message {
    pub fn system(content: impl Into<Arc<str>>) -> Self {
        Message { role: Role::System, content: content.into(), tool_calls: vec![] }
    }

    pub fn user(content: impl Into<Arc<str>>) -> Self {
        Message { role: Role::User, content: content.into(), tool_calls: vec![] }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Message {
            role: Role::Tool { call_id: call_id.into() },
            content: content.into(),
            tool_calls: vec![],
        }
    }
}

/// Trait-driven abstraction for a concrete LLM provider.
///
/// Implementations must be thread-safe (`Send + Sync`) so they can be shared across the worker
/// tasks the [`crate::governor::ConcurrencyGovernor`] drives concurrently.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send a full request/response style chat completion. `tools`, when non-empty, is forwarded
    /// to the provider's native function-calling API; the returned [`Message`] may carry
    /// non-empty `tool_calls` when the provider selected one or more tools.
    async fn send_message(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, Box<dyn Error + Send + Sync>>;

    /// Identifier used to select the upstream model (e.g. `"gpt-4.1-mini"`).
    fn model_name(&self) -> &str;

    /// Cheap reachability probe for `/health`. Default falls back to a minimal chat completion;
    /// providers with a lighter endpoint (e.g. a `/models` listing) should override this.
    async fn ping(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.send_message(&[Message::user("ping")], &[]).await.map(|_| ())
    }

    /// Retrieve usage from the most recent [`ClientWrapper::send_message`] call.
    async fn get_last_usage(&self) -> Option<TokenUsage> {
        if let Some(slot) = self.usage_slot() {
            slot.lock().await.clone()
        } else {
            None
        }
    }

    /// Expose a shared mutable slot the implementation persists token usage into. Providers that
    /// don't track usage can rely on the default `None`.
    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        None
    }
}
