//! Brainstorming: extracted content in, candidate research questions out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::artifacts::{names, ExtractedPage};
use crate::error::StageError;
use crate::event::{Event, EventKind};
use crate::llm::{parse_string_array, CompletionClient, Prompt};
use crate::router::{Stage, StageContext};
use crate::stages::require_artifact;
use crate::store::put_artifact;

/// Per-page text budget when assembling the brainstorming context.
const PAGE_CONTEXT_CHARS: usize = 1500;

const SYSTEM_PROMPT: &str = "You are a research ideation assistant. Given source \
material on a topic, brainstorm original, well-scoped research questions it \
suggests. Respond with a JSON array of question strings and nothing else.";

pub struct BrainstormStage {
    llm: Arc<dyn CompletionClient>,
}

impl BrainstormStage {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for BrainstormStage {
    fn name(&self) -> &'static str {
        "brainstorming"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::ContentExtracted]
    }

    async fn handle(
        &self,
        event: &Event,
        ctx: &StageContext,
    ) -> Result<Vec<Event>, StageError> {
        let Event::ContentExtracted { trace_id, .. } = event else {
            return Err(StageError::UnexpectedEvent(event.name().to_string()));
        };

        let topic: String = require_artifact(ctx, trace_id, names::SEED_TOPIC).await?;
        let pages: Vec<ExtractedPage> =
            require_artifact(ctx, trace_id, names::EXTRACTED_CONTENT).await?;

        // Error-flagged pages carry no usable text and are excluded
        // from the model context.
        let context = build_context(&pages);
        if context.is_empty() {
            return Err(StageError::EmptyBatch(
                "no usable extracted content to brainstorm from".to_string(),
            ));
        }

        let prompt = Prompt::new(
            SYSTEM_PROMPT,
            format!(
                "Topic: {}\n\nSource material:\n\n{}\n\nBrainstorm 6 to 8 research questions.",
                topic, context
            ),
        );

        let raw = self.llm.complete(&prompt).await?;
        let questions = parse_string_array(&raw)?;

        put_artifact(
            ctx.store.as_ref(),
            trace_id,
            names::GENERATED_QUESTIONS,
            &questions,
        )
        .await?;

        info!(
            trace_id = %trace_id,
            question_count = questions.len(),
            "brainstormed research questions"
        );

        Ok(vec![Event::QuestionsGenerated {
            trace_id: trace_id.clone(),
            question_count: questions.len(),
        }])
    }
}

fn build_context(pages: &[ExtractedPage]) -> String {
    pages
        .iter()
        .filter(|p| p.is_usable())
        .map(|p| {
            let body: String = p.text.chars().take(PAGE_CONTEXT_CHARS).collect();
            format!("## {}\n{}", p.title, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
