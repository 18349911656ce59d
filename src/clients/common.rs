//! Shared HTTP plumbing for provider client implementations.

use crate::client_wrapper::{Message, NativeToolCall, Role, TokenUsage, ToolDefinition};
use lazy_static::lazy_static;
use std::error::Error;
use std::time::Duration;
use tokio::sync::Mutex;

lazy_static! {
    /// Shared HTTP client with persistent connection pooling. A single instance keeps TLS
    /// sessions and DNS lookups warm across the many concurrent LLM/search requests the governor
    /// fans out.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build shared HTTP client");
}

pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// Call an OpenAI-compatible Chat Completions endpoint with native tool definitions.
///
/// Posts to `{base_url}/chat/completions` with an `Authorization: Bearer {api_key}` header.
/// Token usage is persisted in `usage_slot` so callers can retrieve it via
/// [`ClientWrapper::get_last_usage`](crate::client_wrapper::ClientWrapper::get_last_usage).
pub async fn send_with_native_tools(
    base_url: &str,
    api_key: &str,
    model: &str,
    temperature: f32,
    messages: &[Message],
    tools: &[ToolDefinition],
    http_client: &reqwest::Client,
    usage_slot: &Mutex<Option<TokenUsage>>,
) -> Result<Message, Box<dyn Error + Send + Sync>> {
    let wire_messages: Vec<serde_json::Value> = messages
        .iter()
        .map(|msg| match &msg.role {
            Role::System => serde_json::json!({"role": "system", "content": msg.content.as_ref()}),
            Role::User => serde_json::json!({"role": "user", "content": msg.content.as_ref()}),
            Role::Assistant => {
                if msg.tool_calls.is_empty() {
                    serde_json::json!({"role": "assistant", "content": msg.content.as_ref()})
                } else {
                    let tool_calls: Vec<serde_json::Value> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            serde_json::json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": serde_json::to_string(&tc.arguments)
                                        .unwrap_or_else(|_| "{}".to_string())
                                }
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "role": "assistant",
                        "content": serde_json::Value::Null,
                        "tool_calls": tool_calls
                    })
                }
            }
            Role::Tool { call_id } => serde_json::json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": msg.content.as_ref()
            }),
        })
        .collect();

    let wire_tools: Vec<serde_json::Value> = tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters_schema
                }
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": wire_messages,
        "temperature": temperature,
    });
    if !wire_tools.is_empty() {
        body["tools"] = serde_json::Value::Array(wire_tools);
    }

    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let resp = http_client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })?;

    if !status.is_success() {
        log::error!("send_with_native_tools: HTTP {} from {}: {}", status, url, text);
        return Err(format!("send_with_native_tools: HTTP {} — {}", status, text).into());
    }

    let parsed: serde_json::Value = serde_json::from_str(&text)?;

    if let Some(usage_obj) = parsed.get("usage") {
        let input = usage_obj.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let output =
            usage_obj.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        *usage_slot.lock().await = Some(TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        });
    }

    let choice_msg = parsed
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or("send_with_native_tools: no choices in response")?;

    let content: std::sync::Arc<str> = choice_msg
        .get("content")
        .and_then(|c| c.as_str())
        .map(std::sync::Arc::from)
        .unwrap_or_else(|| std::sync::Arc::from(""));

    let tool_calls: Vec<NativeToolCall> = choice_msg
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?.to_string();
                    let func = tc.get("function")?;
                    let name = func.get("name")?.as_str()?.to_string();
                    let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
                    let arguments: serde_json::Value = serde_json::from_str(args_str)
                        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
                    Some(NativeToolCall { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Message { role: Role::Assistant, content, tool_calls })
}

/// Cheap reachability probe against an OpenAI-compatible `/models` listing. Used by `/health`
/// instead of a full chat completion so probing doesn't spend generation tokens.
pub async fn ping_models_endpoint(
    base_url: &str,
    api_key: &str,
    http_client: &reqwest::Client,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    let resp = http_client
        .get(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .send()
        .await
        .map_err(|e| -> Box<dyn Error + Send + Sync> { Box::new(e) })?;

    if !resp.status().is_success() {
        return Err(format!("ping_models_endpoint: HTTP {} from {}", resp.status(), url).into());
    }
    Ok(())
}
