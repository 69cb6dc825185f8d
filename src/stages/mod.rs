//! Pipeline stages.
//!
//! Each stage subscribes to one event, reads its input artifacts from
//! the trace store, calls at most one external collaborator, persists
//! its output artifact, and emits the successor event.

mod brainstorm;
mod compile;
mod extract;
mod judge;
mod query_gen;
mod search;

pub use brainstorm::BrainstormStage;
pub use compile::{rank_questions, CompileStage};
pub use extract::ExtractStage;
pub use judge::JudgeStage;
pub use query_gen::QueryGenStage;
pub use search::SearchStage;

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::StageError;
use crate::extract::PageFetcher;
use crate::llm::CompletionClient;
use crate::router::{EventRouter, Stage, StageContext};
use crate::search::SearchClient;
use crate::store::get_artifact;

/// Wire all six stages into a router over the given context.
pub fn build_router(
    ctx: StageContext,
    llm: Arc<dyn CompletionClient>,
    search: Arc<dyn SearchClient>,
    fetcher: Arc<PageFetcher>,
) -> EventRouter {
    let mut router = EventRouter::new(ctx);
    router.register(Arc::new(QueryGenStage::new(llm.clone())));
    router.register(Arc::new(SearchStage::new(search)));
    router.register(Arc::new(ExtractStage::new(fetcher)));
    router.register(Arc::new(BrainstormStage::new(llm.clone())));
    router.register(Arc::new(JudgeStage::new(llm)));
    router.register(Arc::new(CompileStage::new()));
    router
}

/// Read an artifact a stage cannot proceed without.
pub(crate) async fn require_artifact<T: DeserializeOwned>(
    ctx: &StageContext,
    trace_id: &str,
    artifact: &str,
) -> Result<T, StageError> {
    get_artifact(ctx.store.as_ref(), trace_id, artifact)
        .await?
        .ok_or_else(|| StageError::MissingArtifact(format!("{}:{}", trace_id, artifact)))
}
