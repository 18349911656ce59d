//! The top-level state machine composing the two team graphs (spec §4.7).
//!
//! Required progression: `supervisor → Content team → supervisor → Verification team →
//! supervisor → END`, with the meta supervisor free to re-route back to Content team within
//! `meta_recursion_limit` transitions. On `END`, extracts the final artifact and verification
//! report from the accumulated log and writes them to the bound [`ProgressTracker`].

use tokio_util::sync::CancellationToken;

use crate::client_wrapper::{ClientWrapper, Message, Role};
use crate::error::OrchestratorError;
use crate::progress_tracker::{ProgressTracker, TaskUpdate};
use crate::roles::{ask_supervisor, Route};
use crate::task::{AgentName, LinkedInPostArtifact, ScoreReport, TaskError, TaskStatus, TeamName, VerificationReport};
use crate::team_graph::TeamGraph;
use crate::tools::extract_hashtags;

const CONTENT_NODE: &str = "Content team";
const VERIFICATION_NODE: &str = "Verification team";

pub struct MetaGraph {
    content_team: TeamGraph,
    verification_team: TeamGraph,
    recursion_limit: usize,
}

impl MetaGraph {
    pub fn new(content_team: TeamGraph, verification_team: TeamGraph, recursion_limit: usize) -> Self {
        MetaGraph { content_team, verification_team, recursion_limit }
    }

    pub async fn run(
        &self,
        meta_supervisor: &dyn ClientWrapper,
        content_supervisor: &dyn ClientWrapper,
        verification_supervisor: &dyn ClientWrapper,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        tracker
            .update_task(TaskUpdate {
                status: Some(TaskStatus::InProgress),
                phase: Some("starting".to_string()),
                current_step: Some("meta_graph_entered".to_string()),
                ..Default::default()
            })
            .await?;

        let mut log: Vec<Message> = Vec::new();
        let nodes = [CONTENT_NODE, VERIFICATION_NODE];

        for _ in 0..self.recursion_limit {
            if cancel.is_cancelled() {
                return self.fail(tracker, OrchestratorError::cancelled("meta graph cancelled")).await;
            }

            let route = match ask_supervisor(meta_supervisor, &nodes, &log).await {
                Ok(route) => route,
                Err(e) => return self.fail(tracker, e).await,
            };

            match route {
                Route::Finish => return self.finish(tracker, &log).await,
                Route::Member(ref name) if name == CONTENT_NODE => {
                    tracker
                        .update_task(TaskUpdate { phase: Some("content".to_string()), current_step: Some("content_team_entered".to_string()), ..Default::default() })
                        .await?;
                    if let Err(e) = self.content_team.run(TeamName::Content, content_supervisor, &mut log, tracker, cancel).await {
                        return self.fail(tracker, e).await;
                    }
                }
                Route::Member(ref name) if name == VERIFICATION_NODE => {
                    tracker
                        .update_task(TaskUpdate { phase: Some("verification".to_string()), current_step: Some("verification_team_entered".to_string()), ..Default::default() })
                        .await?;
                    if let Err(e) = self.verification_team.run(TeamName::Verification, verification_supervisor, &mut log, tracker, cancel).await {
                        return self.fail(tracker, e).await;
                    }
                }
                Route::Member(other) => {
                    return self.fail(tracker, OrchestratorError::internal(format!("meta supervisor routed to unknown node {}", other))).await;
                }
            }
        }

        self.fail(tracker, OrchestratorError::recursion_exceeded("meta graph exceeded the meta recursion limit")).await
    }

    async fn fail(&self, tracker: &ProgressTracker, error: OrchestratorError) -> Result<(), OrchestratorError> {
        let task_error = TaskError::from(&error);
        let _ = tracker.update_task(TaskUpdate { status: Some(TaskStatus::Failed), error: Some(task_error), ..Default::default() }).await;
        Err(error)
    }

    async fn finish(&self, tracker: &ProgressTracker, log: &[Message]) -> Result<(), OrchestratorError> {
        let raw_content = last_agent_message(log, AgentName::LinkedInCreator.as_str())
            .ok_or_else(|| OrchestratorError::internal("no terminal message from LinkedInCreator"))?;
        let content = strip_fences(&raw_content);
        let hashtags = extract_hashtags(&content);
        let artifact = LinkedInPostArtifact {
            character_count: content.chars().count(),
            word_count: content.split_whitespace().count(),
            content,
            hashtags,
            engagement_score: None,
        };

        let snapshot = tracker.snapshot().await;
        let verification_team = snapshot.teams.get(TeamName::Verification.as_str());
        let technical_text = verification_team
            .and_then(|t| t.agents.get(AgentName::TechVerifier.as_str()))
            .and_then(|a| a.findings.clone())
            .unwrap_or_default();
        let style_text = verification_team
            .and_then(|t| t.agents.get(AgentName::StyleChecker.as_str()))
            .and_then(|a| a.findings.clone())
            .unwrap_or_default();
        let verification = VerificationReport::new(parse_score_report(&technical_text), parse_score_report(&style_text));

        tracker
            .update_task(TaskUpdate {
                status: Some(TaskStatus::Completed),
                phase: Some("completed".to_string()),
                current_step: Some("meta_graph_end".to_string()),
                result: Some(artifact),
                verification: Some(verification),
                ..Default::default()
            })
            .await
    }
}

/// Finds the last assistant message tagged by `agent_runtime` as authored by `agent_name`.
fn last_agent_message(log: &[Message], agent_name: &str) -> Option<String> {
    let prefix = format!("[{}] ", agent_name);
    log.iter().rev().find_map(|m| {
        if !matches!(m.role, Role::Assistant) {
            return None;
        }
        let content = m.content.to_string();
        content.strip_prefix(&prefix).map(str::to_string)
    })
}

/// Strips a leading/trailing code fence and surrounding whitespace, per spec §4.7 result
/// extraction ("stripped of any leading/trailing fence or label").
fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix("```").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim().to_string()
}

/// Parses a tool report of the shape `"Score: 0.95/1.0\nStatus: ...\nIssues: a; b"` (or a bare
/// `"Score: 0.95"` stub, as used by the integration test scenarios) into a [`ScoreReport`].
fn parse_score_report(text: &str) -> ScoreReport {
    let score = text
        .split("Score:")
        .nth(1)
        .and_then(|rest| rest.split(['/', '\n']).next())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0);

    let issues = text
        .split("Issues:")
        .nth(1)
        .map(|rest| rest.lines().next().unwrap_or("").trim())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
        .map(|s| s.split(';').map(|p| p.trim().to_string()).collect())
        .unwrap_or_default();

    ScoreReport { score, issues, suggestions: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_runtime::AgentRuntime;
    use crate::client_wrapper::ToolDefinition;
    use crate::governor::RetryPolicy;
    use crate::progress_tracker::ProgressTracker;
    use crate::task_store::RedisTaskStore;
    use crate::tool_protocol::ToolRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

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

    #[test]
    fn parses_score_and_issues_from_a_full_report() {
        let report = parse_score_report("Score: 0.95/1.0\nStatus: APPROVED\nIssues: none");
        assert!((report.score - 0.95).abs() < 1e-9);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn parses_bare_score_stub() {
        let report = parse_score_report("Score: 0.40");
        assert!((report.score - 0.40).abs() < 1e-9);
    }

    #[test]
    fn strips_code_fences_and_whitespace() {
        assert_eq!(strip_fences("  ```\nhello world\n```  "), "hello world");
    }

    #[tokio::test]
    async fn happy_path_reaches_completed_with_result_and_verification() {
        let content_graph = team_graph("draft with #AI #MachineLearning content");
        let verification_graph = team_graph("Score: 0.90/1.0\nStatus: APPROVED\nIssues: none");
        let meta = MetaGraph::new(content_graph, verification_graph, 50);

        let meta_supervisor = ScriptedClient {
            calls: AtomicUsize::new(0),
            scripted: vec![
                assistant(r#"{"next": "Content team"}"#),
                assistant(r#"{"next": "Verification team"}"#),
                assistant(r#"{"next": "FINISH"}"#),
            ],
        };
        let content_supervisor = ScriptedClient {
            calls: AtomicUsize::new(0),
            scripted: vec![assistant(r#"{"next": "PaperResearcher"}"#), assistant(r#"{"next": "LinkedInCreator"}"#), assistant(r#"{"next": "FINISH"}"#)],
        };
        let verification_supervisor = ScriptedClient {
            calls: AtomicUsize::new(0),
            scripted: vec![assistant(r#"{"next": "TechVerifier"}"#), assistant(r#"{"next": "StyleChecker"}"#), assistant(r#"{"next": "FINISH"}"#)],
        };

        let store = RedisTaskStore::new(None);
        let tracker = ProgressTracker::new("t1".to_string(), serde_json::json!({}), store, Duration::from_secs(60)).await.unwrap();
        tracker.initialize_teams().await.unwrap();

        meta.run(&meta_supervisor, &content_supervisor, &verification_supervisor, &tracker, &CancellationToken::new()).await.unwrap();

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert!((snapshot.progress - 1.0).abs() < 1e-9);
        let result = snapshot.result.unwrap();
        assert!(result.content.contains("draft with"));
        assert_eq!(result.hashtags, vec!["#AI".to_string(), "#MachineLearning".to_string()]);
    }
}
