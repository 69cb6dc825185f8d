//! Research question pipeline: seed topic in, ranked research
//! questions out.
//!
//! A run walks six stages over a per-trace artifact store, driven by
//! an in-process event router: query generation, web search, content
//! extraction, brainstorming, judging, report compilation. The HTTP
//! layer in [`http`] starts runs and serves finished reports.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod event;
pub mod extract;
pub mod http;
pub mod llm;
pub mod router;
pub mod search;
pub mod stages;
pub mod store;

pub use config::Config;
pub use error::{FetchError, LlmError, SearchError, StageError, StoreError};
pub use event::{Event, EventKind};
pub use router::{EventRouter, Stage, StageContext};
pub use store::{MemoryStore, TraceStore};
