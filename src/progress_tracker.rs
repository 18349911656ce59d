//! The sole writer to a [`Task`] during its run.
//!
//! Mirrors the teacher's `EventHandler` capability-set pattern (`cloudllm::event`): graph nodes
//! call into a small set of update methods rather than mutating shared state directly, and this
//! module is the only place invariants I1–I5 and I7 are enforced.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::OrchestratorError;
use crate::task::{AgentName, AgentState, AgentStatus, LinkedInPostArtifact, Task, TaskStatus, TeamName, TeamState, VerificationReport};
use crate::task_store::TaskStore;

const DEBOUNCE: Duration = Duration::from_millis(200);

pub struct ProgressTracker {
    task_id: String,
    store: Arc<dyn TaskStore>,
    ttl: Duration,
    state: Mutex<TrackerState>,
}

struct TrackerState {
    task: Task,
    last_flush: Instant,
}

impl ProgressTracker {
    pub async fn new(
        task_id: String,
        request_data: serde_json::Value,
        store: Arc<dyn TaskStore>,
        ttl: Duration,
    ) -> Result<Arc<Self>, OrchestratorError> {
        let task = Task::new(task_id.clone(), request_data);
        let tracker = Arc::new(ProgressTracker {
            task_id,
            store,
            ttl,
            state: Mutex::new(TrackerState { task, last_flush: Instant::now() }),
        });
        tracker.flush().await?;
        Ok(tracker)
    }

    /// Bind to an existing task record (used when a later stage resumes tracking an
    /// already-PENDING task written by the HTTP handler).
    pub fn bind(task: Task, store: Arc<dyn TaskStore>, ttl: Duration) -> Arc<Self> {
        let task_id = task.task_id.clone();
        Arc::new(ProgressTracker { task_id, store, ttl, state: Mutex::new(TrackerState { task, last_flush: Instant::now() }) })
    }

    pub async fn snapshot(&self) -> Task {
        self.state.lock().await.task.clone()
    }

    /// Writes all four agents IDLE and both teams PENDING (spec §4.2 `InitializeTeams`).
    pub async fn initialize_teams(&self) -> Result<(), OrchestratorError> {
        let mut guard = self.state.lock().await;
        for team in [TeamName::Content, TeamName::Verification] {
            guard.task.teams.insert(team.as_str().to_string(), TeamState::new(team));
        }
        guard.task.recompute_progress();
        self.flush_locked(&mut guard, true).await
    }

    pub async fn update_task(&self, update: TaskUpdate) -> Result<(), OrchestratorError> {
        let mut guard = self.state.lock().await;
        let force_flush = update.status.is_some();

        if let Some(status) = update.status {
            if !guard.task.status.can_advance_to(status) {
                return Err(OrchestratorError::internal(format!(
                    "illegal task status transition {:?} -> {:?}",
                    guard.task.status, status
                )));
            }
            guard.task.status = status;
        }
        if let Some(current_step) = update.current_step {
            guard.task.current_step = current_step;
        }
        if let Some(phase) = update.phase {
            guard.task.phase = phase;
        }
        if let Some(result) = update.result {
            guard.task.result = Some(result);
        }
        if let Some(verification) = update.verification {
            guard.task.verification = Some(verification);
        }
        if let Some(error) = update.error {
            guard.task.error = Some(error);
        }

        // I2 / I3: COMPLETED requires a result and every team COMPLETED; FAILED requires an error.
        if guard.task.status == TaskStatus::Completed {
            if guard.task.result.is_none() {
                return Err(OrchestratorError::internal("cannot mark COMPLETED without a result"));
            }
            if guard.task.teams.values().any(|t| t.status != TaskStatus::Completed) {
                return Err(OrchestratorError::internal("cannot mark COMPLETED with a non-COMPLETED team"));
            }
            guard.task.progress = 1.0;
        }
        if guard.task.status == TaskStatus::Failed && guard.task.error.is_none() {
            return Err(OrchestratorError::internal("cannot mark FAILED without an error"));
        }

        guard.task.updated_at = Utc::now();
        self.flush_locked(&mut guard, force_flush).await
    }

    /// Updates one [`AgentState`], recomputes its team's progress and the overall task progress
    /// per I1, and promotes the team to COMPLETED/FAILED when warranted.
    pub async fn update_agent(&self, agent: AgentName, update: AgentUpdate) -> Result<(), OrchestratorError> {
        let mut guard = self.state.lock().await;
        let team = agent.team();
        let team_key = team.as_str().to_string();

        let team_state = guard
            .task
            .teams
            .get_mut(&team_key)
            .ok_or_else(|| OrchestratorError::internal(format!("team {} not initialized", team_key)))?;

        let agent_state = team_state
            .agents
            .get_mut(agent.as_str())
            .ok_or_else(|| OrchestratorError::internal(format!("agent {} not initialized", agent.as_str())))?;

        if !agent_state.status.can_advance_to(update.status) {
            return Err(OrchestratorError::internal(format!(
                "illegal agent status transition {:?} -> {:?}",
                agent_state.status, update.status
            )));
        }
        agent_state.status = update.status;
        if let Some(activity) = update.activity {
            agent_state.current_activity = Some(activity);
        }
        if let Some(progress) = update.progress {
            agent_state.progress = progress;
        } else if update.status == AgentStatus::Completed {
            agent_state.progress = 1.0;
        }
        if let Some(findings) = update.findings {
            agent_state.findings = Some(findings);
        }
        if let Some(error) = update.error {
            agent_state.error_message = Some(error);
        }
        agent_state.last_update = Utc::now();

        let all_completed = team_state.agents.values().all(|a| a.status == AgentStatus::Completed);
        let any_fatal_error = update.status == AgentStatus::Error && update.fatal;

        team_state.recompute_progress();
        if all_completed {
            team_state.status = TaskStatus::Completed;
            team_state.completed_at = Some(Utc::now());
        } else if any_fatal_error {
            team_state.status = TaskStatus::Failed;
        } else if team_state.status == TaskStatus::Pending {
            team_state.status = TaskStatus::InProgress;
            team_state.started_at = Some(Utc::now());
        }

        guard.task.recompute_progress();
        guard.task.updated_at = Utc::now();

        let force_flush = all_completed || any_fatal_error;
        self.flush_locked(&mut guard, force_flush).await
    }

    /// Marks one team FAILED directly, without routing through an agent transition. Used by
    /// `TeamGraph` on cancellation or recursion-cap exhaustion, where no single agent update
    /// captures the failure.
    pub async fn mark_team_failed(&self, team: TeamName, reason: String) -> Result<(), OrchestratorError> {
        let mut guard = self.state.lock().await;
        let team_key = team.as_str().to_string();
        let team_state = guard
            .task
            .teams
            .get_mut(&team_key)
            .ok_or_else(|| OrchestratorError::internal(format!("team {} not initialized", team_key)))?;
        team_state.status = TaskStatus::Failed;
        team_state.team_findings = Some(reason);
        guard.task.recompute_progress();
        guard.task.updated_at = Utc::now();
        self.flush_locked(&mut guard, true).await
    }

    async fn flush_locked(&self, guard: &mut TrackerState, force: bool) -> Result<(), OrchestratorError> {
        if !force && guard.last_flush.elapsed() < DEBOUNCE {
            return Ok(());
        }
        self.store.put(&guard.task, self.ttl).await?;
        guard.last_flush = Instant::now();
        Ok(())
    }

    /// Flushes the current in-memory state unconditionally. Must be called when the bound job
    /// terminates, regardless of debounce state.
    pub async fn flush(&self) -> Result<(), OrchestratorError> {
        let mut guard = self.state.lock().await;
        self.store.put(&guard.task, self.ttl).await?;
        guard.last_flush = Instant::now();
        Ok(())
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

#[derive(Default)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub current_step: Option<String>,
    pub phase: Option<String>,
    pub result: Option<LinkedInPostArtifact>,
    pub verification: Option<VerificationReport>,
    pub error: Option<crate::task::TaskError>,
}

pub struct AgentUpdate {
    pub status: AgentStatus,
    pub activity: Option<String>,
    pub progress: Option<f64>,
    pub findings: Option<String>,
    pub error: Option<String>,
    /// Whether an ERROR transition should be treated as fatal to the team (see §7 propagation
    /// policy: tool errors are fed back to the LLM unless Cancelled/Timeout, which do terminate).
    pub fatal: bool,
}

impl AgentUpdate {
    pub fn working(activity: impl Into<String>) -> Self {
        AgentUpdate { status: AgentStatus::Working, activity: Some(activity.into()), progress: None, findings: None, error: None, fatal: false }
    }

    pub fn completed(findings: impl Into<String>) -> Self {
        AgentUpdate { status: AgentStatus::Completed, activity: None, progress: Some(1.0), findings: Some(findings.into()), error: None, fatal: false }
    }

    pub fn fatal_error(message: impl Into<String>) -> Self {
        AgentUpdate { status: AgentStatus::Error, activity: None, progress: None, findings: None, error: Some(message.into()), fatal: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_store::RedisTaskStore;

    async fn tracker() -> Arc<ProgressTracker> {
        let store = RedisTaskStore::new(None);
        let tracker = ProgressTracker::new("t1".to_string(), serde_json::json!({}), store, Duration::from_secs(60)).await.unwrap();
        tracker.initialize_teams().await.unwrap();
        tracker
    }

    #[tokio::test]
    async fn agent_completion_drives_team_and_task_progress() {
        let tracker = tracker().await;
        tracker.update_agent(AgentName::PaperResearcher, AgentUpdate::completed("found stuff")).await.unwrap();
        tracker.update_agent(AgentName::LinkedInCreator, AgentUpdate::completed("draft")).await.unwrap();

        let task = tracker.snapshot().await;
        let content = &task.teams[TeamName::Content.as_str()];
        assert_eq!(content.status, TaskStatus::Completed);
        assert!((content.progress - 1.0).abs() < 1e-9);
        // P1: task progress is the mean of team progress (content=1.0, verification=0.0).
        assert!((task.progress - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cannot_complete_task_without_result() {
        let tracker = tracker().await;
        let err = tracker.update_task(TaskUpdate { status: Some(TaskStatus::Completed), ..Default::default() }).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn cannot_move_task_status_backward() {
        let tracker = tracker().await;
        tracker.update_task(TaskUpdate { status: Some(TaskStatus::InProgress), ..Default::default() }).await.unwrap();
        let err = tracker.update_task(TaskUpdate { status: Some(TaskStatus::Pending), ..Default::default() }).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn fatal_agent_error_fails_team_without_failing_other_team() {
        let tracker = tracker().await;
        tracker.update_agent(AgentName::PaperResearcher, AgentUpdate::fatal_error("boom")).await.unwrap();

        let task = tracker.snapshot().await;
        assert_eq!(task.teams[TeamName::Content.as_str()].status, TaskStatus::Failed);
        assert_eq!(task.teams[TeamName::Verification.as_str()].status, TaskStatus::Pending);
    }
}
