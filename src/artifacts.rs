//! Artifact types persisted between stages.
//!
//! Each artifact name is written by exactly one stage and read by its
//! downstream stages. The structs here define the wire shape stored in
//! the trace store envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Artifact names, used both as store keys and as envelope schema tags.
pub mod names {
    pub const SEED_TOPIC: &str = "seed_topic";
    pub const GENERATED_QUERIES: &str = "generated_queries";
    pub const SEARCH_RESULTS: &str = "search_results";
    pub const EXTRACTED_CONTENT: &str = "extracted_content";
    pub const GENERATED_QUESTIONS: &str = "generated_questions";
    pub const EVALUATED_QUESTIONS: &str = "evaluated_questions";
    pub const FINAL_REPORT: &str = "final_report";
}

/// One web search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub relevance_score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Extraction outcome for exactly one search-result URL. Entries with
/// a populated `error` carry no usable text and are excluded from
/// downstream LLM context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedPage {
    pub url: String,
    pub title: String,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractedPage {
    /// Terminal per-URL failure with no usable text.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            text: String::new(),
            excerpt: None,
            length: None,
            error: Some(error.into()),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.error.is_none() && !self.text.is_empty()
    }
}

/// One 1-10 rating with its justification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriterionScore {
    pub score: f64,
    pub justification: String,
}

impl CriterionScore {
    pub fn zero() -> Self {
        Self {
            score: 0.0,
            justification: String::new(),
        }
    }
}

/// A brainstormed question with its four criterion scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatedQuestion {
    pub question: String,
    pub novelty: CriterionScore,
    pub feasibility: CriterionScore,
    pub impact: CriterionScore,
    pub cross_disciplinary: CriterionScore,
    pub overall_score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluatedQuestion {
    /// Successful evaluation; the overall score is the mean of the
    /// four criterion scores rounded to two decimal places.
    pub fn scored(
        question: impl Into<String>,
        novelty: CriterionScore,
        feasibility: CriterionScore,
        impact: CriterionScore,
        cross_disciplinary: CriterionScore,
    ) -> Self {
        let overall = round2(
            (novelty.score + feasibility.score + impact.score + cross_disciplinary.score) / 4.0,
        );
        Self {
            question: question.into(),
            novelty,
            feasibility,
            impact,
            cross_disciplinary,
            overall_score: overall,
            error: None,
        }
    }

    /// Failed evaluation: all-zero placeholder scores, overall 0.
    pub fn failed(question: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            novelty: CriterionScore::zero(),
            feasibility: CriterionScore::zero(),
            impact: CriterionScore::zero(),
            cross_disciplinary: CriterionScore::zero(),
            overall_score: 0.0,
            error: Some(error.into()),
        }
    }
}

/// Counts attached to the final report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    pub total_questions_evaluated: usize,
    pub questions_in_report: usize,
}

/// The final ranked report for one trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    pub trace_id: String,
    pub seed_topic: String,
    pub generated_at: DateTime<Utc>,
    pub top_questions: Vec<EvaluatedQuestion>,
    pub metadata: ReportMetadata,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(score: f64) -> CriterionScore {
        CriterionScore {
            score,
            justification: "test".to_string(),
        }
    }

    #[test]
    fn test_overall_score_is_rounded_mean() {
        let q = EvaluatedQuestion::scored(
            "How?",
            criterion(7.0),
            criterion(8.0),
            criterion(9.0),
            criterion(6.0),
        );
        assert_eq!(q.overall_score, 7.5);

        // 7 + 8 + 8 + 6 = 29 / 4 = 7.25
        let q = EvaluatedQuestion::scored(
            "How?",
            criterion(7.0),
            criterion(8.0),
            criterion(8.0),
            criterion(6.0),
        );
        assert_eq!(q.overall_score, 7.25);
    }

    #[test]
    fn test_rounding_two_decimals() {
        let q = EvaluatedQuestion::scored(
            "q",
            criterion(5.0),
            criterion(5.0),
            criterion(5.0),
            criterion(5.1),
        );
        assert_eq!(q.overall_score, 5.03); // 20.1 / 4 = 5.025 -> 5.03
    }

    #[test]
    fn test_failed_question_is_all_zero() {
        let q = EvaluatedQuestion::failed("q", "judge timeout");
        assert_eq!(q.overall_score, 0.0);
        assert_eq!(q.novelty.score, 0.0);
        assert_eq!(q.cross_disciplinary.score, 0.0);
        assert_eq!(q.error.as_deref(), Some("judge timeout"));
    }

    #[test]
    fn test_failed_page_is_not_usable() {
        let page = ExtractedPage::failed("https://x.test", "HTTP status 404");
        assert!(!page.is_usable());
        assert!(page.text.is_empty());
    }

    #[test]
    fn test_search_hit_optional_fields_omitted() {
        let hit = SearchHit {
            url: "https://x.test".to_string(),
            title: "X".to_string(),
            relevance_score: 0.9,
            published_date: None,
            author: None,
        };
        let json = serde_json::to_string(&hit).unwrap();
        assert!(!json.contains("published_date"));
        assert!(!json.contains("author"));
    }
}
