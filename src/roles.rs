//! Role descriptors: the fixed system prompt + tool set each agent runs with.
//!
//! Prompt text itself is out of scope (spec §1) — the orchestrator only needs to know which role
//! calls which tools, so these are deliberately short.

use crate::client_wrapper::{ClientWrapper, Message};
use crate::error::OrchestratorError;
use crate::task::AgentName;

#[derive(Debug, Clone, Copy)]
pub struct RoleDescriptor {
    pub name: AgentName,
    pub system_prompt: &'static str,
    pub tool_names: &'static [&'static str],
}

pub const PAPER_RESEARCHER: RoleDescriptor = RoleDescriptor {
    name: AgentName::PaperResearcher,
    system_prompt: "You are PaperResearcher. Research the named paper using the available tools, then summarize your findings as a final message with no further tool calls.",
    tool_names: &["research_paper", "web_search"],
};

pub const LINKEDIN_CREATOR: RoleDescriptor = RoleDescriptor {
    name: AgentName::LinkedInCreator,
    system_prompt: "You are LinkedInCreator. Using the research findings in the message log, call create_post to draft a LinkedIn post, then return the final post as your last message.",
    tool_names: &["create_post"],
};

pub const TECH_VERIFIER: RoleDescriptor = RoleDescriptor {
    name: AgentName::TechVerifier,
    system_prompt: "You are TechVerifier. Call verify_technical against the draft post and paper reference, then report the result.",
    tool_names: &["verify_technical"],
};

pub const STYLE_CHECKER: RoleDescriptor = RoleDescriptor {
    name: AgentName::StyleChecker,
    system_prompt: "You are StyleChecker. Call check_style against the draft post, then report the result.",
    tool_names: &["check_style"],
};

pub fn descriptor_for(name: AgentName) -> RoleDescriptor {
    match name {
        AgentName::PaperResearcher => PAPER_RESEARCHER,
        AgentName::LinkedInCreator => LINKEDIN_CREATOR,
        AgentName::TechVerifier => TECH_VERIFIER,
        AgentName::StyleChecker => STYLE_CHECKER,
    }
}

/// A routing decision produced by a supervisor's tolerant JSON-then-name-scan parse
/// (spec §4.6/§4.7). Modeled as a returned value rather than a mutated "next" field per the
/// REDESIGN FLAGS note on globally-mutable routing fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Member(String),
    Finish,
}

/// Parses a supervisor's raw LLM output into a [`Route`]. Tries JSON `{"next": "..."}` first;
/// falls back to a case-insensitive scan for an exact member name; defaults to `Finish` on
/// ambiguity or no match, per spec §4.6.
pub fn parse_route(raw: &str, members: &[&str]) -> Route {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        if let Some(next) = value.get("next").and_then(|v| v.as_str()) {
            if next.eq_ignore_ascii_case("FINISH") {
                return Route::Finish;
            }
            if let Some(member) = members.iter().find(|m| m.eq_ignore_ascii_case(next)) {
                return Route::Member(member.to_string());
            }
            return Route::Finish;
        }
    }

    let lower = raw.to_lowercase();
    let matches: Vec<&&str> = members.iter().filter(|m| lower.contains(&m.to_lowercase())).collect();
    if matches.len() == 1 {
        return Route::Member(matches[0].to_string());
    }
    Route::Finish
}

/// Invokes `client` with a routing prompt over `log` and parses the reply into a [`Route`].
/// Shared by `TeamGraph` and `MetaGraph` supervisor nodes (spec §4.6/§4.7 use the same
/// tolerant-parsing convention at both levels).
pub async fn ask_supervisor(
    client: &dyn ClientWrapper,
    members: &[&str],
    log: &[Message],
) -> Result<Route, OrchestratorError> {
    let prompt = format!(
        "You are the supervisor routing between: {}. Reply with JSON {{\"next\": \"<name>\"}} where <name> is one of the members above, or \"FINISH\" once the work is done.",
        members.join(", ")
    );
    let mut messages = Vec::with_capacity(log.len() + 1);
    messages.push(Message::system(prompt));
    messages.extend_from_slice(log);

    let response = client
        .send_message(&messages, &[])
        .await
        .map_err(|e| OrchestratorError::unavailable(format!("supervisor call failed: {}", e)))?;

    Ok(parse_route(&response.content, members))
}
