//! Pipeline events.
//!
//! Events are a tagged union keyed by event name, so a stage can only
//! ever see the payload shape it subscribed to. Payloads stay small:
//! large intermediate artifacts travel out-of-band through the trace
//! store, and an event is only emitted after its originating stage has
//! persisted the artifacts downstream stages depend on.

use serde::{Deserialize, Serialize};

/// Event kinds, used for stage subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TopicSeeded,
    QueriesGenerated,
    SearchResultsObtained,
    ContentExtracted,
    QuestionsGenerated,
    QuestionsJudged,
    ReportGenerated,
    WorkflowError,
}

impl EventKind {
    /// Dotted wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::TopicSeeded => "topic.seeded",
            EventKind::QueriesGenerated => "queries.generated",
            EventKind::SearchResultsObtained => "search_results.obtained",
            EventKind::ContentExtracted => "content.extracted",
            EventKind::QuestionsGenerated => "questions.generated",
            EventKind::QuestionsJudged => "questions.judged",
            EventKind::ReportGenerated => "report.generated",
            EventKind::WorkflowError => "workflow.error",
        }
    }
}

/// A named event with its typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    TopicSeeded {
        trace_id: String,
    },
    QueriesGenerated {
        trace_id: String,
        query_count: usize,
    },
    SearchResultsObtained {
        trace_id: String,
        result_count: usize,
    },
    ContentExtracted {
        trace_id: String,
        page_count: usize,
        failed_count: usize,
    },
    QuestionsGenerated {
        trace_id: String,
        question_count: usize,
    },
    QuestionsJudged {
        trace_id: String,
        judged_count: usize,
    },
    ReportGenerated {
        trace_id: String,
    },
    WorkflowError {
        trace_id: String,
        stage: String,
        message: String,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TopicSeeded { .. } => EventKind::TopicSeeded,
            Event::QueriesGenerated { .. } => EventKind::QueriesGenerated,
            Event::SearchResultsObtained { .. } => EventKind::SearchResultsObtained,
            Event::ContentExtracted { .. } => EventKind::ContentExtracted,
            Event::QuestionsGenerated { .. } => EventKind::QuestionsGenerated,
            Event::QuestionsJudged { .. } => EventKind::QuestionsJudged,
            Event::ReportGenerated { .. } => EventKind::ReportGenerated,
            Event::WorkflowError { .. } => EventKind::WorkflowError,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn trace_id(&self) -> &str {
        match self {
            Event::TopicSeeded { trace_id }
            | Event::QueriesGenerated { trace_id, .. }
            | Event::SearchResultsObtained { trace_id, .. }
            | Event::ContentExtracted { trace_id, .. }
            | Event::QuestionsGenerated { trace_id, .. }
            | Event::QuestionsJudged { trace_id, .. }
            | Event::ReportGenerated { trace_id }
            | Event::WorkflowError { trace_id, .. } => trace_id,
        }
    }
}
