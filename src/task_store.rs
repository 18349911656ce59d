//! Durable key/value persistence for [`Task`] records.
//!
//! Backed by Redis when `STORE_URL` is set (SET with expiry / GET / SCAN / DEL, mirroring the
//! queue-payload conventions other orchestrator-shaped examples in the pack use), with a
//! mutex-guarded in-process fallback. On any remote error the adapter degrades to the fallback
//! and never promotes back, preserving the single-writer invariant (I6) at the cost of losing
//! persistence for tasks affected by the outage.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::OrchestratorError;
use crate::task::Task;

const KEY_PREFIX: &str = "task:";
const SCAN_COUNT: usize = 200;

/// Walks the full `SCAN` cursor to completion, never blocking the server the way `KEYS` would on
/// a large keyspace.
async fn scan_all_keys(
    conn: &mut redis::aio::MultiplexedConnection,
    pattern: &str,
) -> Result<Vec<String>, redis::RedisError> {
    let mut cursor: u64 = 0;
    let mut keys = Vec::new();
    loop {
        let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .cursor_arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(conn)
            .await?;
        keys.extend(batch);
        if next_cursor == 0 {
            break;
        }
        cursor = next_cursor;
    }
    Ok(keys)
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn put(&self, task: &Task, ttl: Duration) -> Result<(), OrchestratorError>;
    async fn get(&self, task_id: &str) -> Result<Option<Task>, OrchestratorError>;
    async fn list(&self) -> Result<Vec<Task>, OrchestratorError>;
    async fn delete(&self, task_id: &str) -> Result<(), OrchestratorError>;

    /// Lightweight status string for `/health`; does not perform I/O.
    fn health(&self) -> &'static str {
        "ok"
    }

    /// Active reachability probe for `/health`, issuing a real round trip to the store.
    async fn ping(&self) -> Result<(), OrchestratorError> {
        Ok(())
    }
}

/// Guards a single in-process fallback used once the Redis adapter has degraded.
#[derive(Default)]
struct InMemoryMap {
    tasks: Mutex<HashMap<String, Task>>,
}

impl InMemoryMap {
    async fn put(&self, task: &Task) {
        self.tasks.lock().await.insert(task.task_id.clone(), task.clone());
    }

    async fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.lock().await.get(task_id).cloned()
    }

    async fn list(&self) -> Vec<Task> {
        self.tasks.lock().await.values().cloned().collect()
    }

    async fn delete(&self, task_id: &str) {
        self.tasks.lock().await.remove(task_id);
    }
}

/// Redis-backed [`TaskStore`] with one-way degradation to an in-process map.
pub struct RedisTaskStore {
    client: Option<redis::Client>,
    fallback: InMemoryMap,
    degraded: AtomicBool,
}

impl RedisTaskStore {
    /// `store_url: None` means "always fallback" per the `STORE_URL` configuration contract.
    pub fn new(store_url: Option<&str>) -> Arc<Self> {
        let client = store_url.and_then(|url| redis::Client::open(url).ok());
        let degraded = client.is_none();
        if degraded {
            log::warn!("task_store: no STORE_URL configured, running in-process only");
        }
        Arc::new(Self { client, fallback: InMemoryMap::default(), degraded: AtomicBool::new(degraded) })
    }

    fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn degrade(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            log::warn!("task_store: degrading to in-process fallback: {}", reason);
        }
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        let client = self.client.as_ref()?;
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                self.degrade(&e.to_string());
                None
            }
        }
    }
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn put(&self, task: &Task, ttl: Duration) -> Result<(), OrchestratorError> {
        let payload = serde_json::to_string(task)?;

        if !self.is_degraded() {
            if let Some(mut conn) = self.connection().await {
                let key = format!("{}{}", KEY_PREFIX, task.task_id);
                let result: Result<(), redis::RedisError> = redis::cmd("SET")
                    .arg(&key)
                    .arg(&payload)
                    .arg("EX")
                    .arg(ttl.as_secs())
                    .query_async(&mut conn)
                    .await;
                match result {
                    Ok(()) => return Ok(()),
                    Err(e) => self.degrade(&e.to_string()),
                }
            }
        }

        self.fallback.put(task).await;
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<Task>, OrchestratorError> {
        if !self.is_degraded() {
            if let Some(mut conn) = self.connection().await {
                let key = format!("{}{}", KEY_PREFIX, task_id);
                let result: Result<Option<String>, redis::RedisError> =
                    redis::cmd("GET").arg(&key).query_async(&mut conn).await;
                match result {
                    Ok(Some(payload)) => return Ok(Some(serde_json::from_str(&payload)?)),
                    Ok(None) => return Ok(None),
                    Err(e) => self.degrade(&e.to_string()),
                }
            }
        }

        Ok(self.fallback.get(task_id).await)
    }

    async fn list(&self) -> Result<Vec<Task>, OrchestratorError> {
        if !self.is_degraded() {
            if let Some(mut conn) = self.connection().await {
                let pattern = format!("{}*", KEY_PREFIX);
                match scan_all_keys(&mut conn, &pattern).await {
                    Ok(keys) => {
                        let mut tasks = Vec::with_capacity(keys.len());
                        for key in keys {
                            let payload: Option<String> =
                                redis::cmd("GET").arg(&key).query_async(&mut conn).await.unwrap_or(None);
                            if let Some(payload) = payload {
                                if let Ok(task) = serde_json::from_str(&payload) {
                                    tasks.push(task);
                                }
                            }
                        }
                        return Ok(tasks);
                    }
                    Err(e) => self.degrade(&e.to_string()),
                }
            }
        }

        Ok(self.fallback.list().await)
    }

    async fn delete(&self, task_id: &str) -> Result<(), OrchestratorError> {
        if !self.is_degraded() {
            if let Some(mut conn) = self.connection().await {
                let key = format!("{}{}", KEY_PREFIX, task_id);
                let result: Result<(), redis::RedisError> =
                    redis::cmd("DEL").arg(&key).query_async(&mut conn).await;
                if let Err(e) = result {
                    self.degrade(&e.to_string());
                }
            }
        }

        self.fallback.delete(task_id).await;
        Ok(())
    }

    fn health(&self) -> &'static str {
        if self.is_degraded() {
            "degraded"
        } else {
            "ok"
        }
    }

    async fn ping(&self) -> Result<(), OrchestratorError> {
        if self.is_degraded() {
            return Err(OrchestratorError::unavailable("task_store: running in-process fallback, no remote to ping"));
        }
        let mut conn = self
            .connection()
            .await
            .ok_or_else(|| OrchestratorError::unavailable("task_store: no connection available to ping"))?;
        let result: Result<String, redis::RedisError> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.degrade(&e.to_string());
                Err(OrchestratorError::unavailable(format!("task_store: PING failed: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_store_runs_in_fallback_and_round_trips() {
        let store = RedisTaskStore::new(None);
        let task = Task::new("t1".to_string(), serde_json::json!({}));
        store.put(&task, Duration::from_secs(60)).await.unwrap();

        let fetched = store.get("t1").await.unwrap().unwrap();
        assert_eq!(fetched.task_id, "t1");

        assert_eq!(store.list().await.unwrap().len(), 1);

        store.delete("t1").await.unwrap();
        assert!(store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_remote_degrades_and_does_not_promote_back() {
        // Port 1 is reserved and will never accept connections.
        let store = RedisTaskStore::new(Some("redis://127.0.0.1:1/"));
        let task = Task::new("t2".to_string(), serde_json::json!({}));
        store.put(&task, Duration::from_secs(60)).await.unwrap();
        assert!(store.is_degraded());

        let fetched = store.get("t2").await.unwrap();
        assert!(fetched.is_some());
    }
}
