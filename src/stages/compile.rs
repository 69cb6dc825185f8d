//! Report compilation: evaluated questions in, ranked final report out.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::artifacts::{names, EvaluatedQuestion, FinalReport, ReportMetadata};
use crate::error::StageError;
use crate::event::{Event, EventKind};
use crate::router::{Stage, StageContext};
use crate::stages::require_artifact;
use crate::store::{get_artifact, put_artifact};

/// Sentinel used when the seed topic artifact is absent. Degraded
/// mode, not a failure.
const UNKNOWN_TOPIC: &str = "Unknown";

pub struct CompileStage;

impl CompileStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CompileStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Rank evaluated questions: drop error-flagged entries, stable-sort
/// by descending overall score (ties keep input order), keep the first
/// `top_n`. Deterministic: the same input always yields the same list.
pub fn rank_questions(evaluated: &[EvaluatedQuestion], top_n: usize) -> Vec<EvaluatedQuestion> {
    let mut ranked: Vec<EvaluatedQuestion> = evaluated
        .iter()
        .filter(|q| q.error.is_none())
        .cloned()
        .collect();
    ranked.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
    ranked.truncate(top_n);
    ranked
}

#[async_trait]
impl Stage for CompileStage {
    fn name(&self) -> &'static str {
        "compilation"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::QuestionsJudged]
    }

    async fn handle(
        &self,
        event: &Event,
        ctx: &StageContext,
    ) -> Result<Vec<Event>, StageError> {
        let Event::QuestionsJudged { trace_id, .. } = event else {
            return Err(StageError::UnexpectedEvent(event.name().to_string()));
        };

        let evaluated: Vec<EvaluatedQuestion> =
            require_artifact(ctx, trace_id, names::EVALUATED_QUESTIONS).await?;

        let seed_topic: String = get_artifact(ctx.store.as_ref(), trace_id, names::SEED_TOPIC)
            .await?
            .unwrap_or_else(|| UNKNOWN_TOPIC.to_string());

        let top_questions = rank_questions(&evaluated, ctx.config.report_top_n);

        let report = FinalReport {
            trace_id: trace_id.clone(),
            seed_topic,
            generated_at: Utc::now(),
            metadata: ReportMetadata {
                total_questions_evaluated: evaluated.len(),
                questions_in_report: top_questions.len(),
            },
            top_questions,
        };

        put_artifact(ctx.store.as_ref(), trace_id, names::FINAL_REPORT, &report).await?;

        info!(
            trace_id = %trace_id,
            questions_in_report = report.metadata.questions_in_report,
            total_questions_evaluated = report.metadata.total_questions_evaluated,
            "report compiled"
        );

        Ok(vec![Event::ReportGenerated {
            trace_id: trace_id.clone(),
        }])
    }
}
