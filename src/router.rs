//! Stage scheduler / event router.
//!
//! Stages declare which event kinds they react to; the router delivers
//! every emitted event to each subscribed stage independently. There
//! is deliberately no ordering guarantee between subscribers of the
//! same event - each subscriber runs in its own task, so a stage must
//! only rely on artifacts persisted by ancestors in the event chain,
//! never on a sibling subscriber of the same event.
//!
//! A failing stage is isolated: its error is converted into a
//! `workflow.error` event and other subscribers still run. The router
//! never retries a stage; only the fetch unit retries internally.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::StageError;
use crate::event::{Event, EventKind};
use crate::store::TraceStore;

/// Everything a stage invocation may touch: the trace store and the
/// process-wide configuration. Stages hold no other mutable state.
#[derive(Clone)]
pub struct StageContext {
    pub store: Arc<dyn TraceStore>,
    pub config: Arc<Config>,
}

/// A unit of processing triggered by named events. Stages are pure
/// transformations over (event payload, trace state): they read
/// artifacts at the start of handling, write artifacts before
/// returning, and the events they return are dispatched only after
/// `handle` has completed - persist-before-emit falls out of that.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Event kinds this stage reacts to.
    fn subscriptions(&self) -> &'static [EventKind];

    async fn handle(&self, event: &Event, ctx: &StageContext)
        -> Result<Vec<Event>, StageError>;
}

/// Delivers events to subscribed stages and drives one trace's event
/// chain to quiescence.
pub struct EventRouter {
    stages: Vec<Arc<dyn Stage>>,
    ctx: StageContext,
}

impl EventRouter {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            stages: Vec::new(),
            ctx,
        }
    }

    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    /// Run the event chain starting from `initial` until no stage
    /// emits further events. Subscribers of one event run concurrently
    /// in spawned tasks; events emitted in one round are dispatched in
    /// the next.
    pub async fn run(&self, initial: Event) {
        let mut frontier = vec![initial];

        while !frontier.is_empty() {
            let round = std::mem::take(&mut frontier);
            let mut tasks: JoinSet<Vec<Event>> = JoinSet::new();

            for event in round {
                if let Event::WorkflowError {
                    trace_id,
                    stage,
                    message,
                } = &event
                {
                    error!(
                        trace_id = %trace_id,
                        stage = %stage,
                        message = %message,
                        "workflow error"
                    );
                }

                let kind = event.kind();
                for stage in self
                    .stages
                    .iter()
                    .filter(|s| s.subscriptions().contains(&kind))
                {
                    debug!(
                        event = event.name(),
                        stage = stage.name(),
                        trace_id = event.trace_id(),
                        "dispatching event"
                    );

                    let stage = Arc::clone(stage);
                    let ctx = self.ctx.clone();
                    let event = event.clone();
                    tasks.spawn(async move {
                        match stage.handle(&event, &ctx).await {
                            Ok(emitted) => emitted,
                            Err(err) => vec![Event::WorkflowError {
                                trace_id: event.trace_id().to_string(),
                                stage: stage.name().to_string(),
                                message: err.to_string(),
                            }],
                        }
                    });
                }
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(emitted) => frontier.extend(emitted),
                    Err(err) => error!(error = %err, "stage task panicked"),
                }
            }
        }
    }
}
