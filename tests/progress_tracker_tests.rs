//! Integration coverage for the sole-writer tracker (spec §4.2), exercised against the same
//! [`TaskStore`] trait object the daemon wires in production.

use std::time::Duration;

use paperpost::progress_tracker::{AgentUpdate, ProgressTracker, TaskUpdate};
use paperpost::task::{AgentName, TaskStatus, TeamName};
use paperpost::task_store::{RedisTaskStore, TaskStore};

/// `bind()` resumes tracking a task a previous stage already persisted, rather than creating a
/// fresh record, and further writes land in the same store entry.
#[tokio::test]
async fn bind_resumes_an_existing_persisted_task() {
    let store = RedisTaskStore::new(None);
    let tracker = ProgressTracker::new("resume-me".to_string(), serde_json::json!({"topic": "x"}), store.clone(), Duration::from_secs(60))
        .await
        .unwrap();
    tracker.initialize_teams().await.unwrap();
    tracker.update_task(TaskUpdate { current_step: Some("queued".to_string()), ..Default::default() }).await.unwrap();

    let persisted = store.get("resume-me").await.unwrap().unwrap();

    let resumed = ProgressTracker::bind(persisted, store.clone(), Duration::from_secs(60));
    resumed.update_task(TaskUpdate { current_step: Some("resumed".to_string()), ..Default::default() }).await.unwrap();

    let final_task = store.get("resume-me").await.unwrap().unwrap();
    assert_eq!(final_task.current_step, "resumed");
    assert!(final_task.teams.contains_key(TeamName::Content.as_str()), "teams initialized before bind must survive the resume");
}

/// `mark_team_failed` fails one team directly, without an agent transition, and the other team
/// is unaffected — used on cancellation or recursion-cap exhaustion.
#[tokio::test]
async fn mark_team_failed_does_not_touch_the_sibling_team() {
    let store = RedisTaskStore::new(None);
    let tracker = ProgressTracker::new("t1".to_string(), serde_json::json!({}), store, Duration::from_secs(60)).await.unwrap();
    tracker.initialize_teams().await.unwrap();

    tracker.mark_team_failed(TeamName::Verification, "cancelled".to_string()).await.unwrap();

    let snapshot = tracker.snapshot().await;
    assert_eq!(snapshot.teams[TeamName::Verification.as_str()].status, TaskStatus::Failed);
    assert_eq!(snapshot.teams[TeamName::Content.as_str()].status, TaskStatus::Pending);
}

/// Marking FAILED without ever setting an error is rejected (I3), same as marking COMPLETED
/// without a result is rejected elsewhere.
#[tokio::test]
async fn cannot_mark_task_failed_without_an_error() {
    let store = RedisTaskStore::new(None);
    let tracker = ProgressTracker::new("t1".to_string(), serde_json::json!({}), store, Duration::from_secs(60)).await.unwrap();
    tracker.initialize_teams().await.unwrap();

    let err = tracker.update_task(TaskUpdate { status: Some(TaskStatus::Failed), ..Default::default() }).await;
    assert!(err.is_err());
}

/// Illegal agent status transitions (e.g. jumping backward from Completed) are rejected the same
/// way illegal task transitions are.
#[tokio::test]
async fn illegal_agent_transition_is_rejected() {
    let store = RedisTaskStore::new(None);
    let tracker = ProgressTracker::new("t1".to_string(), serde_json::json!({}), store, Duration::from_secs(60)).await.unwrap();
    tracker.initialize_teams().await.unwrap();

    tracker.update_agent(AgentName::PaperResearcher, AgentUpdate::completed("done")).await.unwrap();
    let err = tracker.update_agent(AgentName::PaperResearcher, AgentUpdate::working("researching again")).await;
    assert!(err.is_err());
}
