//! Judging: brainstormed questions in, per-question criterion scores out.
//!
//! Questions are evaluated independently; one question's failure is
//! recorded as an error-flagged, all-zero entry and does not block the
//! others. The output list preserves the input question set and order.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::artifacts::{names, EvaluatedQuestion};
use crate::error::StageError;
use crate::event::{Event, EventKind};
use crate::llm::{parse_evaluation, CompletionClient, Prompt};
use crate::router::{Stage, StageContext};
use crate::stages::require_artifact;
use crate::store::put_artifact;

const SYSTEM_PROMPT: &str = "You are a rigorous research methodology reviewer. Rate \
the given research question on four criteria, each 1-10: novelty, feasibility, \
impact, cross_disciplinary. Respond with a JSON object of the form \
{\"novelty\": {\"score\": n, \"justification\": \"...\"}, \"feasibility\": {...}, \
\"impact\": {...}, \"cross_disciplinary\": {...}} and nothing else.";

pub struct JudgeStage {
    llm: Arc<dyn CompletionClient>,
}

impl JudgeStage {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    async fn judge_one(&self, topic: &str, question: &str) -> EvaluatedQuestion {
        let prompt = Prompt::new(
            SYSTEM_PROMPT,
            format!("Topic: {}\n\nResearch question: {}", topic, question),
        );

        let raw = match self.llm.complete(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(question = %question, error = %err, "evaluation call failed");
                return EvaluatedQuestion::failed(question, err.to_string());
            }
        };

        match parse_evaluation(&raw) {
            Ok(scores) => EvaluatedQuestion::scored(
                question,
                scores.novelty,
                scores.feasibility,
                scores.impact,
                scores.cross_disciplinary,
            ),
            Err(err) => {
                warn!(question = %question, error = %err, "evaluation output invalid");
                EvaluatedQuestion::failed(question, err.to_string())
            }
        }
    }
}

#[async_trait]
impl Stage for JudgeStage {
    fn name(&self) -> &'static str {
        "judging"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::QuestionsGenerated]
    }

    async fn handle(
        &self,
        event: &Event,
        ctx: &StageContext,
    ) -> Result<Vec<Event>, StageError> {
        let Event::QuestionsGenerated { trace_id, .. } = event else {
            return Err(StageError::UnexpectedEvent(event.name().to_string()));
        };

        let topic: String = require_artifact(ctx, trace_id, names::SEED_TOPIC).await?;
        let questions: Vec<String> =
            require_artifact(ctx, trace_id, names::GENERATED_QUESTIONS).await?;

        let mut evaluated = Vec::with_capacity(questions.len());
        for question in &questions {
            evaluated.push(self.judge_one(&topic, question).await);
        }

        put_artifact(
            ctx.store.as_ref(),
            trace_id,
            names::EVALUATED_QUESTIONS,
            &evaluated,
        )
        .await?;

        let failed = evaluated.iter().filter(|q| q.error.is_some()).count();
        info!(
            trace_id = %trace_id,
            judged_count = evaluated.len(),
            failed,
            "judging completed"
        );

        Ok(vec![Event::QuestionsJudged {
            trace_id: trace_id.clone(),
            judged_count: evaluated.len(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::stages::test_support::{test_ctx, ScriptedCompletion};
    use crate::store::get_artifact;

    fn evaluation_json(novelty: f64, feasibility: f64, impact: f64, cross: f64) -> String {
        serde_json::json!({
            "novelty": {"score": novelty, "justification": "j1"},
            "feasibility": {"score": feasibility, "justification": "j2"},
            "impact": {"score": impact, "justification": "j3"},
            "cross_disciplinary": {"score": cross, "justification": "j4"}
        })
        .to_string()
    }

    async fn seed(ctx: &crate::router::StageContext, trace_id: &str, questions: &[&str]) {
        put_artifact(
            ctx.store.as_ref(),
            trace_id,
            names::SEED_TOPIC,
            &"topic".to_string(),
        )
        .await
        .unwrap();
        let questions: Vec<String> = questions.iter().map(|q| q.to_string()).collect();
        put_artifact(
            ctx.store.as_ref(),
            trace_id,
            names::GENERATED_QUESTIONS,
            &questions,
        )
        .await
        .unwrap();
    }

    fn questions_event(trace_id: &str, count: usize) -> Event {
        Event::QuestionsGenerated {
            trace_id: trace_id.to_string(),
            question_count: count,
        }
    }

    #[tokio::test]
    async fn test_judges_each_question_in_order() {
        let ctx = test_ctx();
        seed(&ctx, "t1", &["Q1?", "Q2?"]).await;

        let stage = JudgeStage::new(Arc::new(ScriptedCompletion::new(vec![
            Ok(evaluation_json(8.0, 6.0, 9.0, 7.0)),
            Ok(evaluation_json(5.0, 5.0, 5.0, 5.0)),
        ])));

        let emitted = stage.handle(&questions_event("t1", 2), &ctx).await.unwrap();
        assert!(matches!(
            emitted.as_slice(),
            [Event::QuestionsJudged { judged_count: 2, .. }]
        ));

        let stored: Vec<EvaluatedQuestion> =
            get_artifact(ctx.store.as_ref(), "t1", names::EVALUATED_QUESTIONS)
                .await
                .unwrap()
                .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].question, "Q1?");
        assert_eq!(stored[0].overall_score, 7.5);
        assert_eq!(stored[1].question, "Q2?");
        assert_eq!(stored[1].overall_score, 5.0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let ctx = test_ctx();
        seed(&ctx, "t1", &["Q1?", "Q2?", "Q3?"]).await;

        let stage = JudgeStage::new(Arc::new(ScriptedCompletion::new(vec![
            Ok(evaluation_json(8.0, 8.0, 8.0, 8.0)),
            Err(LlmError::Timeout),
            Ok("not valid json at all".to_string()),
        ])));

        let emitted = stage.handle(&questions_event("t1", 3), &ctx).await.unwrap();
        assert!(matches!(
            emitted.as_slice(),
            [Event::QuestionsJudged { judged_count: 3, .. }]
        ));

        let stored: Vec<EvaluatedQuestion> =
            get_artifact(ctx.store.as_ref(), "t1", names::EVALUATED_QUESTIONS)
                .await
                .unwrap()
                .unwrap();

        // Question set and order preserved.
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1].question, "Q2?");
        assert!(stored[0].error.is_none());
        assert!(stored[1].error.is_some());
        assert_eq!(stored[1].overall_score, 0.0);
        assert!(stored[2].error.is_some());
        assert_eq!(stored[2].overall_score, 0.0);
    }

    #[tokio::test]
    async fn test_all_failures_still_forwarded() {
        let ctx = test_ctx();
        seed(&ctx, "t1", &["Q1?"]).await;

        let stage = JudgeStage::new(Arc::new(ScriptedCompletion::new(vec![Err(
            LlmError::EmptyResponse,
        )])));

        // A fully failed batch is still forwarded; compilation turns
        // it into a valid empty report.
        let emitted = stage.handle(&questions_event("t1", 1), &ctx).await.unwrap();
        assert!(matches!(
            emitted.as_slice(),
            [Event::QuestionsJudged { judged_count: 1, .. }]
        ));
    }
}
