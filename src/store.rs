//! Trace-scoped key-value state store.
//!
//! Stages pass large intermediate artifacts through the store rather
//! than through event payloads. Keys are always
//! `{trace_id}:{artifact_name}`; the store itself is artifact-agnostic.
//! Typed access goes through [`put_artifact`]/[`get_artifact`], which
//! wrap values in a versioned envelope so a reader can reject a
//! malformed or stale artifact instead of assuming its shape.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Current artifact envelope version.
pub const ENVELOPE_VERSION: u32 = 1;

/// Key-value store namespaced by trace identifier.
///
/// `get` on a missing key is not an error; it returns `None`. Store
/// I/O failures are fatal to the invoking stage.
///
/// Traces are never deleted during a run. Garbage collection of stale
/// traces is an extension point for implementations backed by durable
/// storage.
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// Persist a value under a key, overwriting any prior value.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Read a value, or `None` if the key was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
}

/// Build the compound key for one artifact of one trace.
pub fn artifact_key(trace_id: &str, artifact: &str) -> String {
    format!("{}:{}", trace_id, artifact)
}

/// In-memory store for single-run lifetimes.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TraceStore for MemoryStore {
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }
}

/// Versioned wrapper persisted around every artifact value.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    schema: String,
    version: u32,
    data: Value,
}

/// Persist a typed artifact under `{trace_id}:{artifact}`.
pub async fn put_artifact<T: Serialize>(
    store: &dyn TraceStore,
    trace_id: &str,
    artifact: &str,
    value: &T,
) -> Result<(), StoreError> {
    let envelope = Envelope {
        schema: artifact.to_string(),
        version: ENVELOPE_VERSION,
        data: serde_json::to_value(value)?,
    };
    store
        .set(&artifact_key(trace_id, artifact), serde_json::to_value(&envelope)?)
        .await
}

/// Read a typed artifact. Returns `None` when the artifact was never
/// written; fails with [`StoreError::SchemaMismatch`] when the stored
/// envelope does not carry the expected schema tag and version.
pub async fn get_artifact<T: DeserializeOwned>(
    store: &dyn TraceStore,
    trace_id: &str,
    artifact: &str,
) -> Result<Option<T>, StoreError> {
    let key = artifact_key(trace_id, artifact);
    let Some(raw) = store.get(&key).await? else {
        return Ok(None);
    };

    let envelope: Envelope = serde_json::from_value(raw)?;
    if envelope.schema != artifact || envelope.version != ENVELOPE_VERSION {
        return Err(StoreError::SchemaMismatch {
            key,
            expected: artifact.to_string(),
            expected_version: ENVELOPE_VERSION,
            found: envelope.schema,
            found_version: envelope.version,
        });
    }

    Ok(Some(serde_json::from_value(envelope.data)?))
}
