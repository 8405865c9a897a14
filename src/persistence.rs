//! Manifest persistence: writes a depsolve job's resolved output to a
//! result store with a TTL, and reads it back.
//!
//! No teacher file covers this (the teacher persisted to its own sqlite
//! metadata store for a different purpose); grounded on spec 6's "Persisted
//! result layout" and the `set_ttl`/expiring-result pattern Celery backends
//! use, which `original_source`'s coordinator relies on implicitly through
//! its task result backend.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::{DepsolveError, Result};
use crate::model::ManifestEntry;

/// A manifest, keyed by output repo id, with the instant it was written.
#[derive(Clone, Debug)]
pub struct Manifest {
    pub entries: HashMap<String, Vec<ManifestEntry>>,
    pub written_at: SystemTime,
}

/// The store a coordinator run persists its resolved manifest into (spec 6).
/// A real deployment backs this with Redis/the Celery result backend; tests
/// and the CLI demo use `InMemoryResultStore`.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn put(&self, task_id: &str, manifest: Manifest, ttl: Duration) -> Result<()>;
    async fn get(&self, task_id: &str) -> Result<Option<Manifest>>;
}

#[derive(Default)]
pub struct InMemoryResultStore {
    entries: tokio::sync::Mutex<HashMap<String, (Manifest, SystemTime, Duration)>>,
}

impl InMemoryResultStore {
    pub fn new() -> InMemoryResultStore {
        InMemoryResultStore::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, task_id: &str, manifest: Manifest, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(task_id.to_string(), (manifest, SystemTime::now(), ttl));
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<Manifest>> {
        let entries = self.entries.lock().await;
        match entries.get(task_id) {
            Some((manifest, stored_at, ttl)) => {
                let expired = SystemTime::now()
                    .duration_since(*stored_at)
                    .map(|age| age > *ttl)
                    .unwrap_or(false);
                if expired {
                    Ok(None)
                } else {
                    Ok(Some(manifest.clone()))
                }
            }
            None => Ok(None),
        }
    }
}

/// Serializes a manifest to the JSON array-of-entries layout spec 6
/// describes, one array per output repo.
pub fn manifest_to_json(manifest: &Manifest) -> Result<String> {
    serde_json::to_string(&manifest.entries).map_err(|e| DepsolveError::Persistence(e.to_string()))
}

pub fn manifest_from_json(raw: &str) -> Result<HashMap<String, Vec<ManifestEntry>>> {
    serde_json::from_str(raw).map_err(|e| DepsolveError::Persistence(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ManifestUnitType;

    fn sample_manifest() -> Manifest {
        let mut entries = HashMap::new();
        entries.insert(
            "out-repo".to_string(),
            vec![ManifestEntry {
                src_repo_id: "in-repo".to_string(),
                unit_type: ManifestUnitType::RpmUnit,
                unit_attr: "filename".to_string(),
                value: "foo-1.0-1.x86_64.rpm".to_string(),
            }],
        );
        Manifest {
            entries,
            written_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_through_in_memory_store() {
        let store = InMemoryResultStore::new();
        store
            .put("task-1", sample_manifest(), Duration::from_secs(60))
            .await
            .unwrap();
        let fetched = store.get("task-1").await.unwrap().unwrap();
        assert_eq!(fetched.entries["out-repo"].len(), 1);
    }

    #[tokio::test]
    async fn expired_entry_reads_back_as_none() {
        let store = InMemoryResultStore::new();
        store
            .put("task-1", sample_manifest(), Duration::from_millis(0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.get("task-1").await.unwrap().is_none());
    }

    #[test]
    fn json_round_trip_preserves_entries() {
        let manifest = sample_manifest();
        let json = manifest_to_json(&manifest).unwrap();
        let back = manifest_from_json(&json).unwrap();
        assert_eq!(back["out-repo"][0].value, "foo-1.0-1.x86_64.rpm");
    }
}
