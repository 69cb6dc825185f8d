//! Search: generated queries in, deduplicated scored results out.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::artifacts::{names, SearchHit};
use crate::error::StageError;
use crate::event::{Event, EventKind};
use crate::router::{Stage, StageContext};
use crate::search::SearchClient;
use crate::stages::require_artifact;
use crate::store::put_artifact;

pub struct SearchStage {
    search: Arc<dyn SearchClient>,
}

impl SearchStage {
    pub fn new(search: Arc<dyn SearchClient>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Stage for SearchStage {
    fn name(&self) -> &'static str {
        "search"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::QueriesGenerated]
    }

    async fn handle(
        &self,
        event: &Event,
        ctx: &StageContext,
    ) -> Result<Vec<Event>, StageError> {
        let Event::QueriesGenerated { trace_id, .. } = event else {
            return Err(StageError::UnexpectedEvent(event.name().to_string()));
        };

        let queries: Vec<String> =
            require_artifact(ctx, trace_id, names::GENERATED_QUERIES).await?;

        let mut hits: Vec<SearchHit> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for (index, query) in queries.iter().enumerate() {
            // Advisory rate limiting toward the provider.
            if index > 0 && !ctx.config.inter_call_delay.is_zero() {
                tokio::time::sleep(ctx.config.inter_call_delay).await;
            }

            match self
                .search
                .search(query, ctx.config.results_per_query)
                .await
            {
                Ok(results) => {
                    for hit in results {
                        if seen_urls.insert(hit.url.clone()) {
                            hits.push(hit);
                        }
                    }
                }
                // A single query's failure does not halt the batch.
                Err(err) => {
                    warn!(trace_id = %trace_id, query = %query, error = %err, "search query failed");
                }
            }
        }

        if hits.is_empty() {
            return Err(StageError::EmptyBatch(
                "no search results across all queries".to_string(),
            ));
        }

        put_artifact(ctx.store.as_ref(), trace_id, names::SEARCH_RESULTS, &hits).await?;

        info!(
            trace_id = %trace_id,
            result_count = hits.len(),
            query_count = queries.len(),
            "search completed"
        );

        Ok(vec![Event::SearchResultsObtained {
            trace_id: trace_id.clone(),
            result_count: hits.len(),
        }])
    }
}
