//! Process-wide configuration.
//!
//! All credentials and tunables are loaded once at startup and passed
//! explicitly into every stage invocation. No stage reads the
//! environment on its own.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Configuration for the research-question pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the completion service.
    pub llm_api_key: String,

    /// Base URL of an OpenAI-compatible chat completions API.
    pub llm_base_url: String,

    /// Model name sent with every completion request.
    pub llm_model: String,

    /// Sampling temperature for completions.
    pub temperature: f32,

    /// Timeout for a single completion call.
    pub completion_timeout: Duration,

    /// API key for the web search service.
    pub search_api_key: String,

    /// Base URL of the search API.
    pub search_base_url: String,

    /// Timeout for a single search call.
    pub search_timeout: Duration,

    /// Maximum results requested per search query.
    pub results_per_query: usize,

    /// Advisory delay between consecutive search calls.
    pub inter_call_delay: Duration,

    /// Per-attempt timeout for one page fetch.
    pub fetch_timeout: Duration,

    /// Maximum fetch attempts per URL.
    pub fetch_max_attempts: u32,

    /// Fixed delay between fetch attempts.
    pub fetch_retry_delay: Duration,

    /// Number of questions kept in the final report.
    pub report_top_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            completion_timeout: Duration::from_secs(90),
            search_api_key: String::new(),
            search_base_url: "https://api.tavily.com".to_string(),
            search_timeout: Duration::from_secs(30),
            results_per_query: 2,
            inter_call_delay: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(15),
            fetch_max_attempts: 3,
            fetch_retry_delay: Duration::from_secs(1),
            report_top_n: 5,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, starting from
    /// defaults. A local `.env` file is honored for development.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("LLM_API_KEY") {
            config.llm_api_key = val;
        }
        if let Ok(val) = env::var("LLM_BASE_URL") {
            config.llm_base_url = val;
        }
        if let Ok(val) = env::var("LLM_MODEL") {
            config.llm_model = val;
        }
        if let Ok(val) = env::var("LLM_TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("LLM_TEMPERATURE must be a valid floating-point number")?;
        }
        if let Ok(val) = env::var("COMPLETION_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("COMPLETION_TIMEOUT_SECS must be a positive integer")?;
            config.completion_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("SEARCH_API_KEY") {
            config.search_api_key = val;
        }
        if let Ok(val) = env::var("SEARCH_BASE_URL") {
            config.search_base_url = val;
        }
        if let Ok(val) = env::var("SEARCH_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("SEARCH_TIMEOUT_SECS must be a positive integer")?;
            config.search_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("RESULTS_PER_QUERY") {
            config.results_per_query = val
                .parse()
                .context("RESULTS_PER_QUERY must be a positive integer")?;
        }
        if let Ok(val) = env::var("INTER_CALL_DELAY_MS") {
            let ms: u64 = val
                .parse()
                .context("INTER_CALL_DELAY_MS must be a non-negative integer")?;
            config.inter_call_delay = Duration::from_millis(ms);
        }
        if let Ok(val) = env::var("FETCH_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("FETCH_TIMEOUT_SECS must be a positive integer")?;
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("FETCH_MAX_ATTEMPTS") {
            config.fetch_max_attempts = val
                .parse()
                .context("FETCH_MAX_ATTEMPTS must be a positive integer")?;
        }
        if let Ok(val) = env::var("FETCH_RETRY_DELAY_MS") {
            let ms: u64 = val
                .parse()
                .context("FETCH_RETRY_DELAY_MS must be a non-negative integer")?;
            config.fetch_retry_delay = Duration::from_millis(ms);
        }
        if let Ok(val) = env::var("REPORT_TOP_N") {
            config.report_top_n = val
                .parse()
                .context("REPORT_TOP_N must be a positive integer")?;
        }

        Ok(config)
    }

    /// Validate before the pipeline starts. Better to fail fast at
    /// startup than with a confusing error mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.llm_api_key.is_empty() {
            anyhow::bail!("LLM_API_KEY must be set");
        }
        if self.search_api_key.is_empty() {
            anyhow::bail!("SEARCH_API_KEY must be set");
        }
        if self.llm_model.is_empty() {
            anyhow::bail!("LLM_MODEL cannot be empty");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "LLM_TEMPERATURE must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }
        if self.results_per_query == 0 {
            anyhow::bail!("RESULTS_PER_QUERY must be at least 1");
        }
        if self.fetch_max_attempts == 0 {
            anyhow::bail!("FETCH_MAX_ATTEMPTS must be at least 1");
        }
        if self.report_top_n == 0 {
            anyhow::bail!("REPORT_TOP_N must be at least 1");
        }
        Ok(())
    }
}
