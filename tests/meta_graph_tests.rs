//! Integration coverage for the top-level state machine (spec §4.7): failure propagation and
//! recursion-cap behavior that the happy-path unit test in `meta_graph.rs` doesn't exercise.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use paperpost::agent_runtime::AgentRuntime;
use paperpost::client_wrapper::{ClientWrapper, Message, Role, ToolDefinition};
use paperpost::error::ErrorKind;
use paperpost::governor::RetryPolicy;
use paperpost::meta_graph::MetaGraph;
use paperpost::progress_tracker::ProgressTracker;
use paperpost::task::TaskStatus;
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

fn team_graph(final_reply: &'static str) -> TeamGraph {
    let client: Arc<dyn ClientWrapper> = Arc::new(ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(final_reply)] });
    let registry = Arc::new(ToolRegistry::empty());
    let runtime = Arc::new(AgentRuntime::new(client, registry, RetryPolicy::default(), 8));
    TeamGraph::new(runtime, 25)
}

/// A content-team failure (the supervisor routes to an agent outside the roster) propagates up
/// through `MetaGraph::run` and leaves the task FAILED with a populated error, not merely an
/// `Err` return with no persisted trace.
#[tokio::test]
async fn content_team_failure_marks_the_task_failed_with_an_error() {
    let content_graph = team_graph("draft");
    let verification_graph = team_graph("Score: 0.90");
    let meta = MetaGraph::new(content_graph, verification_graph, 50);

    let meta_supervisor = ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(r#"{"next": "Content team"}"#)] };
    let content_supervisor = ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(r#"{"next": "NotARealAgent"}"#)] };
    let verification_supervisor = ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(r#"{"next": "FINISH"}"#)] };

    let store = RedisTaskStore::new(None);
    let tracker = ProgressTracker::new("t1".to_string(), serde_json::json!({}), store, Duration::from_secs(60)).await.unwrap();
    tracker.initialize_teams().await.unwrap();

    let result = meta.run(&meta_supervisor, &content_supervisor, &verification_supervisor, &tracker, &CancellationToken::new()).await;
    assert!(result.is_err());

    let snapshot = tracker.snapshot().await;
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert!(snapshot.error.is_some());
}

/// A meta supervisor that never emits `FINISH` or a known node name exhausts the meta recursion
/// limit and fails the task rather than looping forever.
#[tokio::test]
async fn meta_supervisor_stuck_in_a_loop_exceeds_the_recursion_limit() {
    let content_graph = team_graph("draft");
    let verification_graph = team_graph("Score: 0.90");
    let meta = MetaGraph::new(content_graph, verification_graph, 2);

    let meta_supervisor =
        ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(r#"{"next": "Content team"}"#), assistant(r#"{"next": "Content team"}"#)] };
    let content_supervisor = ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(r#"{"next": "FINISH"}"#)] };
    let verification_supervisor = ScriptedClient { calls: AtomicUsize::new(0), scripted: vec![assistant(r#"{"next": "FINISH"}"#)] };

    let store = RedisTaskStore::new(None);
    let tracker = ProgressTracker::new("t1".to_string(), serde_json::json!({}), store, Duration::from_secs(60)).await.unwrap();
    tracker.initialize_teams().await.unwrap();

    let err = meta.run(&meta_supervisor, &content_supervisor, &verification_supervisor, &tracker, &CancellationToken::new()).await;
    assert!(matches!(err, Err(e) if e.kind == ErrorKind::RecursionExceeded));
}
