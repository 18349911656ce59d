//! The per-team supervised state machine (spec §4.6).
//!
//! One `supervisor` node routes to member nodes or `END`; member nodes invoke
//! [`AgentRuntime`] with that member's role, then return control to the supervisor. Modeled as
//! an explicit loop over a tagged [`Route`] value rather than a graph-DSL, per the REDESIGN
//! FLAGS note on globally-mutable routing fields and duck-typed progress callbacks — grounded
//! in the teacher's `TeamFormation`/dispatch-loop shape in `cloudllm::agent`.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::agent_runtime::AgentRuntime;
use crate::client_wrapper::{ClientWrapper, Message};
use crate::error::OrchestratorError;
use crate::progress_tracker::{AgentUpdate, ProgressTracker};
use crate::roles::{ask_supervisor, descriptor_for, Route};
use crate::task::{AgentName, TeamName};

pub struct TeamGraph {
    runtime: Arc<AgentRuntime>,
    recursion_limit: usize,
}

impl TeamGraph {
    pub fn new(runtime: Arc<AgentRuntime>, recursion_limit: usize) -> Self {
        TeamGraph { runtime, recursion_limit }
    }

    /// Drives `team` to completion, appending every agent/supervisor turn to `log`. Returns once
    /// the supervisor emits `FINISH`; propagates a terminating error (`Cancelled`, `Timeout`, or
    /// a fatal agent-step failure) otherwise, having already marked the team FAILED.
    pub async fn run(
        &self,
        team: TeamName,
        supervisor: &dyn ClientWrapper,
        log: &mut Vec<Message>,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let members = AgentName::members_of(team);
        let member_names: Vec<&str> = members.iter().map(AgentName::as_str).collect();

        for _ in 0..self.recursion_limit {
            if cancel.is_cancelled() {
                tracker.mark_team_failed(team, "cancelled while awaiting supervisor routing".to_string()).await?;
                return Err(OrchestratorError::cancelled("team graph cancelled"));
            }

            let route = ask_supervisor(supervisor, &member_names, log).await?;
            let member_name = match route {
                Route::Finish => return Ok(()),
                Route::Member(name) => name,
            };

            let agent = *members
                .iter()
                .find(|m| m.as_str() == member_name)
                .ok_or_else(|| OrchestratorError::internal(format!("supervisor routed to unknown member {}", member_name)))?;

            tracker.update_agent(agent, AgentUpdate::working(format!("running {}", agent.as_str()))).await?;

            let descriptor = descriptor_for(agent);
            match self.runtime.run(descriptor, log, "", cancel).await {
                Ok(outcome) => {
                    log.extend(outcome.appended_log);
                    tracker.update_agent(agent, AgentUpdate::completed(outcome.final_message)).await?;
                }
                Err(e) => {
                    tracker.update_agent(agent, AgentUpdate::fatal_error(e.message.clone())).await?;
                    return Err(e);
                }
            }
        }

        tracker.mark_team_failed(team, "team recursion limit exceeded".to_string()).await?;
        Err(OrchestratorError::recursion_exceeded(format!("{} exceeded the team recursion limit", team.as_str())))
    }
}
