//! Environment-driven configuration.
//!
//! Mirrors the teacher's philosophy in `cloudllm::config`: users/operators construct this
//! manually from the process environment, no config-file parsing crate is pulled in.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub search_api_key: Option<String>,
    pub store_url: Option<String>,
    pub store_ttl_seconds: u64,
    pub max_concurrent_generations: usize,
    pub max_concurrent_verifications: usize,
    pub verification_timeout_seconds: u64,
    pub meta_recursion_limit: usize,
    pub team_recursion_limit: usize,
    pub max_tool_rounds: usize,
    pub llm_model: String,
    pub llm_temperature: f32,
}

impl Config {
    /// Build configuration from the process environment, applying the documented defaults for
    /// anything unset. `LLM_API_KEY` has no default and is the only variable this panics on.
    pub fn from_env() -> Self {
        Config {
            llm_api_key: env::var("LLM_API_KEY").expect("LLM_API_KEY must be set"),
            search_api_key: env::var("SEARCH_API_KEY").ok(),
            store_url: env::var("STORE_URL").ok(),
            store_ttl_seconds: env_parse("STORE_TTL_SECONDS", 7200),
            max_concurrent_generations: env_parse("MAX_CONCURRENT_GENERATIONS", 3),
            max_concurrent_verifications: env_parse("MAX_CONCURRENT_VERIFICATIONS", 5),
            verification_timeout_seconds: env_parse("VERIFICATION_TIMEOUT_SECONDS", 120),
            meta_recursion_limit: env_parse("META_RECURSION_LIMIT", 50),
            team_recursion_limit: env_parse("TEAM_RECURSION_LIMIT", 25),
            max_tool_rounds: env_parse("MAX_TOOL_ROUNDS", 8),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
            llm_temperature: env_parse("LLM_TEMPERATURE", 0.7),
        }
    }

    pub fn store_ttl(&self) -> Duration {
        Duration::from_secs(self.store_ttl_seconds)
    }

    pub fn verification_timeout(&self) -> Duration {
        Duration::from_secs(self.verification_timeout_seconds)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
