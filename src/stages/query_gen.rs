//! Query generation: seed topic in, web search queries out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::artifacts::names;
use crate::error::StageError;
use crate::event::{Event, EventKind};
use crate::llm::{parse_string_array, CompletionClient, Prompt};
use crate::router::{Stage, StageContext};
use crate::stages::require_artifact;
use crate::store::put_artifact;

const SYSTEM_PROMPT: &str = "You are a research strategist. Given a research topic, \
produce diverse, specific web search queries that together cover the topic's \
key angles. Respond with a JSON array of strings and nothing else.";

pub struct QueryGenStage {
    llm: Arc<dyn CompletionClient>,
}

impl QueryGenStage {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for QueryGenStage {
    fn name(&self) -> &'static str {
        "query-generation"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::TopicSeeded]
    }

    async fn handle(
        &self,
        event: &Event,
        ctx: &StageContext,
    ) -> Result<Vec<Event>, StageError> {
        let Event::TopicSeeded { trace_id } = event else {
            return Err(StageError::UnexpectedEvent(event.name().to_string()));
        };

        let topic: String = require_artifact(ctx, trace_id, names::SEED_TOPIC).await?;

        let prompt = Prompt::new(
            SYSTEM_PROMPT,
            format!(
                "Research topic: {}\n\nGenerate 3 to 5 web search queries.",
                topic
            ),
        );

        let raw = self.llm.complete(&prompt).await?;
        // Zero parseable queries fails the stage loudly; downstream
        // has nothing to work with.
        let queries = parse_string_array(&raw)?;

        put_artifact(ctx.store.as_ref(), trace_id, names::GENERATED_QUERIES, &queries).await?;

        info!(
            trace_id = %trace_id,
            query_count = queries.len(),
            "generated search queries"
        );

        Ok(vec![Event::QueriesGenerated {
            trace_id: trace_id.clone(),
            query_count: queries.len(),
        }])
    }
}
