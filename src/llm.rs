//! Completion service adapter.
//!
//! Wraps a single external completion call: prompt construction is the
//! calling stage's job, this module owns the HTTP call, the
//! strict-then-fallback JSON parsing policy, and shape validation.
//! The adapter never retries completion calls - they are
//! cost-sensitive, so retry policy (if any) belongs to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::artifacts::CriterionScore;
use crate::config::Config;
use crate::error::LlmError;

/// A structured prompt: system instruction plus user text.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// One completion request in, raw text out, bounded by a timeout.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

/// Client for an OpenAI-compatible chat completions API.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            temperature: config.temperature,
            timeout: config.completion_timeout,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        debug!(model = %self.model, "sending completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(content)
    }
}

/// Field names conventionally used for the payload array in model
/// output objects, checked before falling back to any array field.
const ARRAY_FIELD_CANDIDATES: &[&str] = &["queries", "questions", "items", "results"];

/// Parse model output expected to be an array of strings.
///
/// Policy: strict JSON parse first. A root array is used directly; a
/// root object is searched for a conventionally named array field,
/// then for the first array-valued field anywhere in it. If strict
/// parsing fails entirely, quoted substrings are extracted as a last
/// resort. An empty result is an [`LlmError::InvalidShape`].
pub fn parse_string_array(raw: &str) -> Result<Vec<String>, LlmError> {
    let cleaned = strip_code_fences(raw);

    let items = match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Array(values)) => collect_strings(&values),
        Ok(Value::Object(map)) => {
            let array = ARRAY_FIELD_CANDIDATES
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_array).cloned())
                .or_else(|| find_first_array(&Value::Object(map.clone())));
            match array {
                Some(values) => collect_strings(&values),
                None => Vec::new(),
            }
        }
        Ok(_) => Vec::new(),
        Err(_) => extract_quoted_strings(cleaned),
    };

    if items.is_empty() {
        return Err(LlmError::InvalidShape(
            "expected a non-empty JSON array of strings".to_string(),
        ));
    }
    Ok(items)
}

/// The four criterion scores parsed from a judging completion.
#[derive(Debug, Clone)]
pub struct EvaluationScores {
    pub novelty: CriterionScore,
    pub feasibility: CriterionScore,
    pub impact: CriterionScore,
    pub cross_disciplinary: CriterionScore,
}

/// Parse model output expected to be an object with four named
/// criterion fields, each `{score: 1-10, justification}`.
pub fn parse_evaluation(raw: &str) -> Result<EvaluationScores, LlmError> {
    let cleaned = strip_code_fences(raw);

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| LlmError::InvalidShape(format!("evaluation is not valid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| LlmError::InvalidShape("evaluation root is not an object".to_string()))?;

    Ok(EvaluationScores {
        novelty: parse_criterion(object, "novelty")?,
        feasibility: parse_criterion(object, "feasibility")?,
        impact: parse_criterion(object, "impact")?,
        cross_disciplinary: parse_criterion_aliased(
            object,
            &["cross_disciplinary", "crossDisciplinary"],
        )?,
    })
}

fn parse_criterion(
    object: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<CriterionScore, LlmError> {
    parse_criterion_aliased(object, &[field])
}

fn parse_criterion_aliased(
    object: &serde_json::Map<String, Value>,
    names: &[&str],
) -> Result<CriterionScore, LlmError> {
    let field = names[0];
    let entry = names
        .iter()
        .find_map(|name| object.get(*name))
        .ok_or_else(|| LlmError::InvalidShape(format!("missing criterion: {}", field)))?;

    let score = entry
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| LlmError::InvalidShape(format!("{}.score is not numeric", field)))?;

    if !(1.0..=10.0).contains(&score) {
        return Err(LlmError::InvalidShape(format!(
            "{}.score out of range 1-10: {}",
            field, score
        )));
    }

    let justification = entry
        .get("justification")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(CriterionScore {
        score,
        justification,
    })
}

/// Trim markdown code fences the model may wrap its JSON in.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn collect_strings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Depth-first search for the first array-valued field in an object.
fn find_first_array(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(values) => Some(values.clone()),
        Value::Object(map) => map.values().find_map(find_first_array),
        _ => None,
    }
}

/// Last-resort heuristic: pull out every double-quoted substring.
fn extract_quoted_strings(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => {
                if in_quotes {
                    let item = current.trim().to_string();
                    if !item.is_empty() {
                        items.push(item);
                    }
                    current.clear();
                }
                in_quotes = !in_quotes;
            }
            _ if in_quotes => current.push(ch),
            _ => {}
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_array() {
        let raw = r#"["query A", "query B", "query C"]"#;
        let parsed = parse_string_array(raw).unwrap();
        assert_eq!(parsed, vec!["query A", "query B", "query C"]);
    }

    #[test]
    fn test_parse_conventional_field() {
        let raw = r#"{"queries": ["a", "b"]}"#;
        assert_eq!(parse_string_array(raw).unwrap(), vec!["a", "b"]);

        let raw = r#"{"questions": ["q1"]}"#;
        assert_eq!(parse_string_array(raw).unwrap(), vec!["q1"]);
    }

    #[test]
    fn test_parse_falls_back_to_any_array_field() {
        let raw = r#"{"analysis": "deep", "output": {"list": ["x", "y"]}}"#;
        assert_eq!(parse_string_array(raw).unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_parse_code_fenced_json() {
        let raw = "```json\n[\"a\", \"b\"]\n```";
        assert_eq!(parse_string_array(raw).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_quoted_substring_heuristic() {
        let raw = "Here are the queries:\n1. \"rust async\"\n2. \"tokio runtime\"";
        assert_eq!(
            parse_string_array(raw).unwrap(),
            vec!["rust async", "tokio runtime"]
        );
    }

    #[test]
    fn test_parse_empty_array_is_invalid_shape() {
        assert!(matches!(
            parse_string_array("[]"),
            Err(LlmError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_parse_garbage_is_invalid_shape() {
        assert!(matches!(
            parse_string_array("no usable content here"),
            Err(LlmError::InvalidShape(_))
        ));
    }

    fn sample_evaluation() -> String {
        serde_json::json!({
            "novelty": {"score": 8, "justification": "new angle"},
            "feasibility": {"score": 6, "justification": "hard but doable"},
            "impact": {"score": 9, "justification": "high stakes"},
            "cross_disciplinary": {"score": 7, "justification": "bridges fields"}
        })
        .to_string()
    }

    #[test]
    fn test_parse_evaluation_ok() {
        let scores = parse_evaluation(&sample_evaluation()).unwrap();
        assert_eq!(scores.novelty.score, 8.0);
        assert_eq!(scores.feasibility.score, 6.0);
        assert_eq!(scores.impact.score, 9.0);
        assert_eq!(scores.cross_disciplinary.score, 7.0);
        assert_eq!(scores.novelty.justification, "new angle");
    }

    #[test]
    fn test_parse_evaluation_camel_case_alias() {
        let raw = serde_json::json!({
            "novelty": {"score": 5, "justification": ""},
            "feasibility": {"score": 5, "justification": ""},
            "impact": {"score": 5, "justification": ""},
            "crossDisciplinary": {"score": 5, "justification": ""}
        })
        .to_string();
        let scores = parse_evaluation(&raw).unwrap();
        assert_eq!(scores.cross_disciplinary.score, 5.0);
    }

    #[test]
    fn test_parse_evaluation_missing_criterion() {
        let raw = r#"{"novelty": {"score": 8, "justification": "x"}}"#;
        assert!(matches!(
            parse_evaluation(raw),
            Err(LlmError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_parse_evaluation_non_numeric_score() {
        let raw = serde_json::json!({
            "novelty": {"score": "eight", "justification": ""},
            "feasibility": {"score": 5, "justification": ""},
            "impact": {"score": 5, "justification": ""},
            "cross_disciplinary": {"score": 5, "justification": ""}
        })
        .to_string();
        assert!(matches!(
            parse_evaluation(&raw),
            Err(LlmError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_parse_evaluation_score_out_of_range() {
        let raw = serde_json::json!({
            "novelty": {"score": 12, "justification": ""},
            "feasibility": {"score": 5, "justification": ""},
            "impact": {"score": 5, "justification": ""},
            "cross_disciplinary": {"score": 5, "justification": ""}
        })
        .to_string();
        assert!(matches!(
            parse_evaluation(&raw),
            Err(LlmError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("[1]"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
    }

    #[test]
    fn test_extract_quoted_respects_escapes() {
        let items = extract_quoted_strings(r#"say "a \"quoted\" word" now"#);
        assert_eq!(items, vec![r#"a "quoted" word"#]);
    }
}
