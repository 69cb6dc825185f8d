//! Content extraction: search results in, per-URL extracted pages out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::artifacts::{names, ExtractedPage, SearchHit};
use crate::error::StageError;
use crate::event::{Event, EventKind};
use crate::extract::PageFetcher;
use crate::router::{Stage, StageContext};
use crate::stages::require_artifact;
use crate::store::put_artifact;

pub struct ExtractStage {
    fetcher: Arc<PageFetcher>,
}

impl ExtractStage {
    pub fn new(fetcher: Arc<PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Stage for ExtractStage {
    fn name(&self) -> &'static str {
        "content-extraction"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::SearchResultsObtained]
    }

    async fn handle(
        &self,
        event: &Event,
        ctx: &StageContext,
    ) -> Result<Vec<Event>, StageError> {
        let Event::SearchResultsObtained { trace_id, .. } = event else {
            return Err(StageError::UnexpectedEvent(event.name().to_string()));
        };

        let hits: Vec<SearchHit> = require_artifact(ctx, trace_id, names::SEARCH_RESULTS).await?;

        let pages = self.fetcher.extract_all(&hits).await;
        let failed_count = pages.iter().filter(|p| !p.is_usable()).count();
        let usable_count = pages.len() - failed_count;

        // Persist the full batch, error entries included, before
        // deciding whether the run can continue.
        put_artifact(ctx.store.as_ref(), trace_id, names::EXTRACTED_CONTENT, &pages).await?;

        if usable_count == 0 {
            return Err(StageError::EmptyBatch(
                "no page yielded usable content".to_string(),
            ));
        }

        info!(
            trace_id = %trace_id,
            page_count = pages.len(),
            failed_count,
            "content extraction completed"
        );

        Ok(vec![Event::ContentExtracted {
            trace_id: trace_id.clone(),
            page_count: pages.len(),
            failed_count,
        }])
    }
}
