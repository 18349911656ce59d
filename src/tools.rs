//! The deterministic tool catalog (spec §4.5).
//!
//! Every tool is a pure function over its JSON inputs returning a string; none of them raise —
//! failures are encoded as strings in the [`ToolResult`] so the calling agent can react, per the
//! teacher's `CustomToolProtocol` convention in `tool_protocols.rs`.

use async_trait::async_trait;
use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;

use crate::clients::search::WebSearchClient;
use crate::tool_protocol::{ToolError, ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult};

const HYPE_WORDS: &[&str] = &["revolutionary", "breakthrough", "perfect", "solves", "guarantees"];
const STYLE_READY_THRESHOLD: f64 = 0.7;
const TECHNICAL_APPROVED_THRESHOLD: f64 = 0.7;

pub struct PaperPostTools {
    search: Arc<dyn WebSearchClient>,
}

impl PaperPostTools {
    pub fn new(search: Arc<dyn WebSearchClient>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl ToolProtocol for PaperPostTools {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        match tool_name {
            "research_paper" => self.research_paper(parameters).await,
            "web_search" => self.web_search(parameters).await,
            "create_post" => Ok(create_post(parameters)),
            "verify_technical" => Ok(verify_technical(parameters)),
            "check_style" => Ok(check_style(parameters)),
            other => Err(Box::new(ToolError::NotFound(other.to_string()))),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![
            ToolMetadata::new("research_paper", "Researches a paper by title plus optional focus areas.")
                .with_parameter(ToolParameter::new("title", ToolParameterType::String).required())
                .with_parameter(ToolParameter::new("focus_areas", ToolParameterType::Array)),
            ToolMetadata::new("web_search", "Performs a web search and returns labelled results.")
                .with_parameter(ToolParameter::new("query", ToolParameterType::String).required()),
            ToolMetadata::new("create_post", "Formats a LinkedIn post from content and key insights.")
                .with_parameter(ToolParameter::new("content", ToolParameterType::String).required())
                .with_parameter(ToolParameter::new("paper_title", ToolParameterType::String).required())
                .with_parameter(ToolParameter::new("key_insights", ToolParameterType::Array).required())
                .with_parameter(ToolParameter::new("tone", ToolParameterType::String))
                .with_parameter(ToolParameter::new("audience", ToolParameterType::String))
                .with_parameter(ToolParameter::new("max_hashtags", ToolParameterType::Integer)),
            ToolMetadata::new("verify_technical", "Scores a post for technical overstatement/attribution issues.")
                .with_parameter(ToolParameter::new("post_content", ToolParameterType::String).required())
                .with_parameter(ToolParameter::new("paper_reference", ToolParameterType::String).required()),
            ToolMetadata::new("check_style", "Scores a post's structural style metrics.")
                .with_parameter(ToolParameter::new("post_content", ToolParameterType::String).required()),
        ])
    }

    fn protocol_name(&self) -> &str {
        "paperpost_tools"
    }
}

impl PaperPostTools {
    async fn research_paper(&self, parameters: serde_json::Value) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let title = parameters.get("title").and_then(|v| v.as_str()).unwrap_or_default();
        let focus_areas: Vec<String> = parameters
            .get("focus_areas")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut sections = Vec::new();
        sections.push(format!("[{}]\n{}", title, search_section(&self.search, title).await));
        for focus in &focus_areas {
            let query = format!("{} {}", title, focus);
            sections.push(format!("[{}]\n{}", focus, search_section(&self.search, &query).await));
        }

        Ok(ToolResult::success(serde_json::json!(sections.join("\n\n"))))
    }

    async fn web_search(&self, parameters: serde_json::Value) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let query = parameters.get("query").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(ToolResult::success(serde_json::json!(search_section(&self.search, query).await)))
    }
}

async fn search_section(search: &Arc<dyn WebSearchClient>, query: &str) -> String {
    match search.search(query, 5).await {
        Ok(results) if !results.is_empty() => results
            .iter()
            .map(|r| format!("- {} ({}): {}", r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(_) => "No results found.".to_string(),
        Err(e) => format!("SEARCH_ERROR: {}", e),
    }
}

/// Pure formatter: opening line, numbered insights (≤5), engagement question, hashtag block.
fn create_post(parameters: serde_json::Value) -> ToolResult {
    let content = parameters.get("content").and_then(|v| v.as_str()).unwrap_or_default();
    let paper_title = parameters.get("paper_title").and_then(|v| v.as_str()).unwrap_or_default();
    let key_insights: Vec<String> = parameters
        .get("key_insights")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let max_hashtags = parameters.get("max_hashtags").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

    let mut post = String::new();
    post.push_str(&format!("Just read \"{}\" — here's what stood out:\n\n", paper_title));
    if !content.is_empty() {
        post.push_str(content);
        post.push_str("\n\n");
    }
    for (i, insight) in key_insights.iter().take(5).enumerate() {
        post.push_str(&format!("{}. {}\n", i + 1, insight));
    }
    post.push('\n');
    post.push_str("What's your take on this?\n\n");
    post.push_str(&select_hashtags(paper_title, &key_insights, max_hashtags).join(" "));

    ToolResult::success(serde_json::json!(post))
}

/// Deterministic hashtag selection: derives tags from capitalized/technical-looking tokens in
/// the title and insights, in order of first appearance, deduplicated, capped at `max`.
fn select_hashtags(paper_title: &str, key_insights: &[String], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    let candidates = std::iter::once(paper_title.to_string()).chain(key_insights.iter().cloned());

    for text in candidates {
        for word in text.split_whitespace() {
            let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
            if cleaned.len() < 3 {
                continue;
            }
            let tag = format!("#{}", cleaned);
            if seen.insert(tag.to_lowercase()) {
                tags.push(tag);
                if tags.len() >= max {
                    return tags;
                }
            }
        }
    }

    for fallback in ["#AI", "#MachineLearning", "#Research"] {
        if tags.len() >= max {
            break;
        }
        if seen.insert(fallback.to_lowercase()) {
            tags.push(fallback.to_string());
        }
    }
    tags
}

/// `score = max(0, 1 - 0.2 * |issues|)`, where issues are overstatement triggers or a missing
/// attribution signal. Shared by the `verify_technical` tool and the standalone `/verify-post`
/// endpoint, which bypasses the LLM tool loop entirely (spec §9 open question on verify's
/// lifecycle: it returns synchronously without a Task).
pub fn technical_score_report(post_content: &str, paper_reference: &str) -> crate::task::ScoreReport {
    let lower = post_content.to_lowercase();
    let mut issues = Vec::new();
    for hype_word in HYPE_WORDS {
        if lower.contains(hype_word) {
            issues.push(format!("overstatement: \"{}\"", hype_word));
        }
    }
    let reference_prefix: String = paper_reference.to_lowercase().chars().take(20).collect();
    if !reference_prefix.is_empty() && !lower.contains(&reference_prefix) {
        issues.push("missing citation/author attribution".to_string());
    }

    let score = (1.0 - 0.2 * issues.len() as f64).max(0.0);
    let suggestions = if issues.is_empty() { Vec::new() } else { vec!["tone down absolute claims and cite the paper directly".to_string()] };
    crate::task::ScoreReport { score, issues, suggestions }
}

/// Base 1.0, minus 0.1 per violated band (char count, emoji, engagement question, hashtag
/// count, numbered list).
pub fn style_score_report(post_content: &str) -> crate::task::ScoreReport {
    let char_count = post_content.chars().count();
    let emoji_count = post_content.chars().filter(|c| is_emoji(*c)).count();
    let hashtag_count = post_content.split_whitespace().filter(|w| w.starts_with('#')).count();
    let has_engagement_question = post_content.contains('?');
    let has_numbered_list = (1..=5).any(|n| post_content.contains(&format!("{}. ", n)));

    let mut issues = Vec::new();
    let mut score: f64 = 1.0;

    if !(600..=1300).contains(&char_count) {
        score -= 0.1;
        issues.push(format!("char count {} outside [600, 1300]", char_count));
    }
    if emoji_count == 0 {
        score -= 0.1;
        issues.push("no emoji".to_string());
    }
    if !has_engagement_question {
        score -= 0.1;
        issues.push("no engagement question".to_string());
    }
    if !(3..=15).contains(&hashtag_count) {
        score -= 0.1;
        issues.push(format!("hashtag count {} outside [3, 15]", hashtag_count));
    }
    if !has_numbered_list {
        score -= 0.1;
        issues.push("missing numbered list".to_string());
    }
    let score = score.max(0.0);
    let suggestions = if issues.is_empty() { Vec::new() } else { vec!["adjust length, add an emoji, a question, and a numbered list".to_string()] };

    crate::task::ScoreReport { score, issues, suggestions }
}

fn format_report(report: &crate::task::ScoreReport, ready_label: &str, threshold: f64) -> String {
    let status = if report.score >= threshold { ready_label } else { "NEEDS_REVISION" };
    format!(
        "Score: {:.2}/1.0\nStatus: {}\nIssues: {}",
        report.score,
        status,
        if report.issues.is_empty() { "none".to_string() } else { report.issues.join("; ") }
    )
}

fn verify_technical(parameters: serde_json::Value) -> ToolResult {
    let post_content = parameters.get("post_content").and_then(|v| v.as_str()).unwrap_or_default();
    let paper_reference = parameters.get("paper_reference").and_then(|v| v.as_str()).unwrap_or_default();
    let report = technical_score_report(post_content, paper_reference);
    let text = format_report(&report, "APPROVED", TECHNICAL_APPROVED_THRESHOLD);
    ToolResult::success(serde_json::json!(text))
        .with_metadata("score", serde_json::json!(report.score))
        .with_metadata("issues", serde_json::json!(report.issues))
}

fn check_style(parameters: serde_json::Value) -> ToolResult {
    let post_content = parameters.get("post_content").and_then(|v| v.as_str()).unwrap_or_default();
    let report = style_score_report(post_content);
    let text = format_report(&report, "LINKEDIN READY", STYLE_READY_THRESHOLD);
    ToolResult::success(serde_json::json!(text))
        .with_metadata("score", serde_json::json!(report.score))
        .with_metadata("issues", serde_json::json!(report.issues))
}

fn is_emoji(c: char) -> bool {
    let cp = c as u32;
    (0x1F300..=0x1FAFF).contains(&cp) || (0x2600..=0x27BF).contains(&cp)
}

/// Extracts `#[A-Za-z0-9_]+` in order of first appearance, deduplicated (P8: idempotent under
/// repeated application).
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    let mut current = String::new();

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '#' {
            current.push(c);
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if current.len() > 1 && seen.insert(current.clone()) {
                tags.push(current.clone());
            }
            current.clear();
        }
    }
    tags
}
