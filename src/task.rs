//! Data model: the value types persisted to [`crate::task_store::TaskStore`].
//!
//! Every entity here is a plain serializable value. Mutation discipline (who is allowed to write
//! them, and when) lives in [`crate::progress_tracker`], not in these types themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// I4: PENDING → IN_PROGRESS → {COMPLETED, FAILED}, never backward.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, InProgress)
                | (Pending, Completed)
                | (Pending, Failed)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Completed, Completed)
                | (Failed, Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    Idle,
    Working,
    Completed,
    Error,
}

impl AgentStatus {
    /// I5: IDLE → WORKING → {COMPLETED, ERROR}, never backward.
    pub fn can_advance_to(self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        matches!(
            (self, next),
            (Idle, Idle)
                | (Idle, Working)
                | (Idle, Completed)
                | (Idle, Error)
                | (Working, Working)
                | (Working, Completed)
                | (Working, Error)
                | (Completed, Completed)
                | (Error, Error)
        )
    }
}

/// The two fixed teams. Membership is the compile-time mapping from I8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamName {
    Content,
    Verification,
}

impl TeamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamName::Content => "Content team",
            TeamName::Verification => "Verification team",
        }
    }
}

/// The four fixed agent roles. Each belongs to exactly one team (I8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentName {
    PaperResearcher,
    LinkedInCreator,
    TechVerifier,
    StyleChecker,
}

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::PaperResearcher => "PaperResearcher",
            AgentName::LinkedInCreator => "LinkedInCreator",
            AgentName::TechVerifier => "TechVerifier",
            AgentName::StyleChecker => "StyleChecker",
        }
    }

    pub fn team(&self) -> TeamName {
        match self {
            AgentName::PaperResearcher | AgentName::LinkedInCreator => TeamName::Content,
            AgentName::TechVerifier | AgentName::StyleChecker => TeamName::Verification,
        }
    }

    pub fn members_of(team: TeamName) -> &'static [AgentName] {
        match team {
            TeamName::Content => &[AgentName::PaperResearcher, AgentName::LinkedInCreator],
            TeamName::Verification => &[AgentName::TechVerifier, AgentName::StyleChecker],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_name: String,
    pub status: AgentStatus,
    pub current_activity: Option<String>,
    pub progress: f64,
    pub findings: Option<String>,
    pub last_update: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl AgentState {
    pub fn idle(agent_name: AgentName) -> Self {
        AgentState {
            agent_name: agent_name.as_str().to_string(),
            status: AgentStatus::Idle,
            current_activity: None,
            progress: 0.0,
            findings: None,
            last_update: Utc::now(),
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamState {
    pub team_name: String,
    pub status: TaskStatus,
    pub progress: f64,
    pub current_focus: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub team_findings: Option<String>,
    pub agents: HashMap<String, AgentState>,
}

impl TeamState {
    pub fn new(team: TeamName) -> Self {
        let agents = AgentName::members_of(team)
            .iter()
            .map(|&a| (a.as_str().to_string(), AgentState::idle(a)))
            .collect();
        TeamState {
            team_name: team.as_str().to_string(),
            status: TaskStatus::Pending,
            progress: 0.0,
            current_focus: None,
            started_at: None,
            completed_at: None,
            team_findings: None,
            agents,
        }
    }

    /// I1 (team level): team progress is the mean of its agents' progress, 0 for an empty team.
    pub fn recompute_progress(&mut self) {
        if self.agents.is_empty() {
            self.progress = 0.0;
            return;
        }
        let sum: f64 = self.agents.values().map(|a| a.progress).sum();
        self.progress = sum / self.agents.len() as f64;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInPostArtifact {
    pub content: String,
    pub hashtags: Vec<String>,
    pub word_count: usize,
    pub character_count: usize,
    pub engagement_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Rating::Excellent
        } else if score >= 0.75 {
            Rating::Good
        } else if score >= 0.5 {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub technical: ScoreReport,
    pub style: ScoreReport,
    pub overall_score: f64,
    pub recommendations: Vec<String>,
    pub rating: Rating,
}

impl VerificationReport {
    pub fn new(technical: ScoreReport, style: ScoreReport) -> Self {
        let overall_score = (technical.score + style.score) / 2.0;
        let mut recommendations = Vec::new();
        recommendations.extend(technical.suggestions.clone());
        recommendations.extend(style.suggestions.clone());
        VerificationReport {
            rating: Rating::from_score(overall_score),
            technical,
            style,
            overall_score,
            recommendations,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: String,
    pub message: String,
}

impl From<&crate::error::OrchestratorError> for TaskError {
    fn from(e: &crate::error::OrchestratorError) -> Self {
        TaskError { kind: format!("{:?}", e.kind), message: e.message.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: f64,
    pub current_step: String,
    pub phase: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub request_data: serde_json::Value,
    pub teams: HashMap<String, TeamState>,
    pub result: Option<LinkedInPostArtifact>,
    pub verification: Option<VerificationReport>,
    pub error: Option<TaskError>,
}

impl Task {
    pub fn new(task_id: String, request_data: serde_json::Value) -> Self {
        let now = Utc::now();
        Task {
            task_id,
            status: TaskStatus::Pending,
            progress: 0.0,
            current_step: "accepted".to_string(),
            phase: "pending".to_string(),
            created_at: now,
            updated_at: now,
            request_data,
            teams: HashMap::new(),
            result: None,
            verification: None,
            error: None,
        }
    }

    /// I1 (task level): overall progress is the mean of team progress.
    pub fn recompute_progress(&mut self) {
        if self.teams.is_empty() {
            self.progress = 0.0;
            return;
        }
        let sum: f64 = self.teams.values().map(|t| t.progress).sum();
        self.progress = sum / self.teams.len() as f64;
    }
}
