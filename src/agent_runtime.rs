//! The per-agent tool-call loop (spec §4.4).
//!
//! Submits the running log plus a scratchpad to the LLM with native tool definitions, executes
//! whatever tool calls come back in the order the model emitted them, and re-invokes until the
//! model returns a plain assistant message with no tool calls. Grounded in the teacher's
//! `AgentDefinition`/tool-loop shape (`cloudllm::agent`), adapted to the native tool-calling
//! convention `client_wrapper.rs` already speaks.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client_wrapper::{ClientWrapper, Message, Role};
use crate::error::OrchestratorError;
use crate::governor::{with_timeout, RetryPolicy};
use crate::roles::RoleDescriptor;
use crate::tool_protocol::ToolRegistry;

/// Raised when an agent exceeds its tool-round budget without producing a terminal message.
pub const MAX_TOOL_ROUNDS_EXCEEDED: &str = "agent exceeded its tool round budget";

pub struct AgentRuntime {
    client: Arc<dyn ClientWrapper>,
    tools: Arc<ToolRegistry>,
    retry: RetryPolicy,
    max_tool_rounds: usize,
}

/// The outcome of running one agent to completion: its terminal message content, plus the log
/// entries it appended (tagged with the agent's name so later stages can attribute them).
pub struct AgentRunOutcome {
    pub final_message: String,
    pub appended_log: Vec<Message>,
}

impl AgentRuntime {
    pub fn new(client: Arc<dyn ClientWrapper>, tools: Arc<ToolRegistry>, retry: RetryPolicy, max_tool_rounds: usize) -> Self {
        AgentRuntime { client, tools, retry, max_tool_rounds }
    }

    /// Runs `descriptor`'s tool-call loop against `log` (the team's running conversation so far,
    /// not mutated in place — callers append the returned log to their own copy).
    pub async fn run(
        &self,
        descriptor: RoleDescriptor,
        log: &[Message],
        scratchpad: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentRunOutcome, OrchestratorError> {
        let tool_defs: Vec<_> = self
            .tools
            .list_tools()
            .into_iter()
            .filter(|t| descriptor.tool_names.contains(&t.name.as_str()))
            .map(|t| crate::client_wrapper::ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters_schema: t.to_parameters_schema(),
            })
            .collect();

        let mut conversation: Vec<Message> = Vec::with_capacity(log.len() + 2);
        conversation.push(Message::system(descriptor.system_prompt));
        conversation.extend_from_slice(log);
        if !scratchpad.is_empty() {
            conversation.push(Message::user(scratchpad.to_string()));
        }

        let mut appended = Vec::new();

        for _round in 0..self.max_tool_rounds {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::cancelled("cancelled during agent tool-call loop"));
            }

            let client = self.client.clone();
            let messages = conversation.clone();
            let tools = tool_defs.clone();
            let response = self
                .retry
                .run(cancel, || {
                    let client = client.clone();
                    let messages = messages.clone();
                    let tools = tools.clone();
                    async move {
                        with_timeout(None, cancel, async {
                            client
                                .send_message(&messages, &tools)
                                .await
                                .map_err(|e| OrchestratorError::unavailable(format!("llm call failed: {}", e)))
                        })
                        .await
                    }
                })
                .await?;

            if response.tool_calls.is_empty() {
                let tagged = Message { role: Role::Assistant, content: format!("[{}] {}", descriptor.name.as_str(), response.content).into(), tool_calls: vec![] };
                appended.push(tagged.clone());
                return Ok(AgentRunOutcome { final_message: response.content.to_string(), appended_log: appended });
            }

            appended.push(response.clone());
            conversation.push(response.clone());

            for call in &response.tool_calls {
                if cancel.is_cancelled() {
                    return Err(OrchestratorError::cancelled("cancelled during tool execution"));
                }
                let result = self.tools.execute_tool(&call.name, call.arguments.clone()).await;
                let content = match result {
                    Ok(tool_result) if tool_result.success => tool_result
                        .output
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| tool_result.output.to_string()),
                    Ok(tool_result) => format!("ERROR: {}", tool_result.error.unwrap_or_else(|| "tool reported failure".to_string())),
                    Err(e) => format!("ERROR: {}", e),
                };
                let tool_message = Message::tool_result(call.id.clone(), content);
                appended.push(tool_message.clone());
                conversation.push(tool_message);
            }
        }

        Err(OrchestratorError::recursion_exceeded(MAX_TOOL_ROUNDS_EXCEEDED))
    }
}
