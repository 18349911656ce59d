//! Integration coverage for the per-team supervised loop (spec §4.6), driven through the public
//! API the same way `MetaGraph` drives it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use paperpost::agent_runtime::AgentRuntime;
use paperpost::client_wrapper::{ClientWrapper, Message, Role, ToolDefinition};
use paperpost::error::ErrorKind;
use paperpost::governor::RetryPolicy;
use paperpost::progress_tracker::ProgressTracker;
use paperpost::task::TeamName;
use paperpost::task_store::RedisTaskStore;
use paperpost::team_graph::TeamGraph;
use paperpost::tool_protocol::ToolRegistry;

struct ScriptedClient {
    calls: AtomicUsize,
    scripted: Vec<Message>,
}

#[async_trait]
impl ClientWrapper for ScriptedClient {
    async fn send_message(&self, _messages: &[Message], _tools: &[ToolDefinition]) -> Result<Message, Box<dyn std::error::Error + Send + Sync>> {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scripted[i.min(self.scripted.len() - 1)].clone())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn assistant(content: &str) -> Message {
    Message { role: Role::Assistant, content: content.into(), tool_calls: vec![] }
}

async fn tracker() -> Arc<ProgressTracker> {
    let store = RedisTaskStore::new(None);
    let t = ProgressTracker::new("t1".to_string(), serde_json::json!({}), store, Duration::from_secs(60)).await.unwrap();
    t.initialize_teams().await.unwrap();
    t
}

/// A supervisor routing to a member not in that team's roster is a fatal, unrecoverable error
/// rather than a silent skip.
#[tokio::test]
async fn routing_to_an_unknown_member_is_rejected() {
    let agent_client: Arc<dyn ClientWrapper> = Arc::new(ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant("ok")] });
    let registry = Arc::new(ToolRegistry::empty());
    let runtime = Arc::new(AgentRuntime::new(agent_client, registry, RetryPolicy::default(), 8));
    let team_graph = TeamGraph::new(runtime, 25);

    let supervisor = ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(r#"{"next": "NotARealAgent"}"#)] };

    let tracker = tracker().await;
    let mut log = Vec::new();
    let err = team_graph.run(TeamName::Content, &supervisor, &mut log, &tracker, &CancellationToken::new()).await;
    assert!(err.is_err());
}

/// Cancelling before the supervisor responds marks the team FAILED and returns `Cancelled`
/// rather than letting the loop continue.
#[tokio::test]
async fn cancellation_before_supervisor_routing_fails_the_team() {
    let agent_client: Arc<dyn ClientWrapper> = Arc::new(ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant("ok")] });
    let registry = Arc::new(ToolRegistry::empty());
    let runtime = Arc::new(AgentRuntime::new(agent_client, registry, RetryPolicy::default(), 8));
    let team_graph = TeamGraph::new(runtime, 25);

    let supervisor = ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(r#"{"next": "FINISH"}"#)] };

    let tracker = tracker().await;
    let mut log = Vec::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = team_graph.run(TeamName::Content, &supervisor, &mut log, &tracker, &cancel).await;
    assert!(matches!(err, Err(e) if e.kind == ErrorKind::Cancelled));

    let snapshot = tracker.snapshot().await;
    assert_eq!(snapshot.teams[TeamName::Content.as_str()].status, paperpost::task::TaskStatus::Failed);
}
