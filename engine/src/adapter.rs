//! The store adapter port.
//!
//! The engine consumes this contract and never implements it: each remote
//! store gets an adapter that materializes reads into [`TableSnapshot`]s,
//! replaces contents wholesale on write, and reports a best-effort
//! modification timestamp. Credential handling lives entirely behind this
//! boundary.

use crate::cell::CellValue;
use crate::snapshot::TableSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Failures an adapter can report.
///
/// Detail strings must never carry credential material; adapters sanitize
/// before constructing these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The store has no usable configuration (missing ids or credentials).
    #[error("store is not configured")]
    NotConfigured,

    /// The engine's per-call deadline elapsed before the store answered.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The store could not be reached at all.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The store answered with a non-success status.
    #[error("store returned status {status}: {detail}")]
    Api { status: u16, detail: String },

    /// The store answered with a payload the adapter could not interpret.
    #[error("malformed store response: {0}")]
    InvalidData(String),
}

/// Adapter health as shown on the status surface.
///
/// Consumed only by status reporting, never by the decision policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Not configured")]
    NotConfigured,
    #[serde(rename = "Error")]
    Error,
}

impl fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterStatus::Ok => write!(f, "OK"),
            AdapterStatus::NotConfigured => write!(f, "Not configured"),
            AdapterStatus::Error => write!(f, "Error"),
        }
    }
}

/// Read/write access to one remote tabular store.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Materialize the store's full table, or fail. Partial reads are
    /// forbidden: implementations return everything or an error.
    async fn read(&self) -> Result<TableSnapshot, AdapterError>;

    /// Replace the store's visible contents with the snapshot's rows, or
    /// fail without partial modification.
    async fn write(&self, snapshot: &TableSnapshot) -> Result<(), AdapterError>;

    /// The store's own last-modified timestamp. `Ok(None)` is an expected
    /// outcome for stores that cannot report one.
    async fn last_modified(&self) -> Result<Option<DateTime<Utc>>, AdapterError>;

    /// Adapter health for the status surface.
    async fn status(&self) -> AdapterStatus;
}

struct MemoryState {
    rows: Vec<Vec<CellValue>>,
    modified_at: Option<DateTime<Utc>>,
    status: AdapterStatus,
    fail_reads: bool,
    fail_writes: bool,
    fail_metadata: bool,
    read_delay: Option<Duration>,
}

/// In-memory [`SourceAdapter`].
///
/// The reference test double for engine behavior: tables and modification
/// timestamps are settable, reads and writes are countable, and each call
/// kind can be made to fail or stall on demand.
pub struct MemoryAdapter {
    state: Mutex<MemoryState>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryAdapter {
    /// An empty, healthy store.
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    /// A store pre-seeded with rows.
    pub fn with_rows(rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                rows,
                modified_at: None,
                status: AdapterStatus::Ok,
                fail_reads: false,
                fail_writes: false,
                fail_metadata: false,
                read_delay: None,
            }),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Replace the stored rows without touching the modified timestamp.
    pub async fn set_rows(&self, rows: Vec<Vec<CellValue>>) {
        self.state.lock().await.rows = rows;
    }

    /// Set the store-reported modification timestamp.
    pub async fn set_modified_at(&self, modified_at: Option<DateTime<Utc>>) {
        self.state.lock().await.modified_at = modified_at;
    }

    /// Override the reported status.
    pub async fn set_status(&self, status: AdapterStatus) {
        self.state.lock().await.status = status;
    }

    /// Make every subsequent read fail.
    pub async fn fail_reads(&self, fail: bool) {
        self.state.lock().await.fail_reads = fail;
    }

    /// Make every subsequent write fail (without modifying stored rows).
    pub async fn fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    /// Make every subsequent last-modified probe fail.
    pub async fn fail_metadata(&self, fail: bool) {
        self.state.lock().await.fail_metadata = fail;
    }

    /// Stall reads by the given duration before answering.
    pub async fn set_read_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.read_delay = delay;
    }

    /// Current stored rows.
    pub async fn rows(&self) -> Vec<Vec<CellValue>> {
        self.state.lock().await.rows.clone()
    }

    /// Number of read calls observed.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls observed.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for MemoryAdapter {
    async fn read(&self) -> Result<TableSnapshot, AdapterError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let (rows, fail, delay) = {
            let state = self.state.lock().await;
            (state.rows.clone(), state.fail_reads, state.read_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(AdapterError::Transport("injected read failure".to_string()));
        }

        Ok(TableSnapshot::new(rows, Utc::now()))
    }

    async fn write(&self, snapshot: &TableSnapshot) -> Result<(), AdapterError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        if state.fail_writes {
            return Err(AdapterError::Transport("injected write failure".to_string()));
        }

        state.rows = snapshot.rows().to_vec();
        state.modified_at = Some(Utc::now());
        Ok(())
    }

    async fn last_modified(&self) -> Result<Option<DateTime<Utc>>, AdapterError> {
        let state = self.state.lock().await;
        if state.fail_metadata {
            return Err(AdapterError::Transport(
                "injected metadata failure".to_string(),
            ));
        }
        Ok(state.modified_at)
    }

    async fn status(&self) -> AdapterStatus {
        self.state.lock().await.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::Text(v.to_string())).collect()
    }

    #[tokio::test]
    async fn read_returns_full_table() {
        let adapter = MemoryAdapter::new();
        adapter.set_rows(vec![row(&["a", "b"]), row(&["c"])]).await;

        let snapshot = adapter.read().await.unwrap();
        assert_eq!(snapshot.row_count(), 2);
        assert_eq!(adapter.read_count(), 1);
    }

    #[tokio::test]
    async fn write_replaces_contents_wholesale() {
        let adapter = MemoryAdapter::new();
        adapter.set_rows(vec![row(&["old"])]).await;

        let replacement = TableSnapshot::new(vec![row(&["new"]), row(&["rows"])], Utc::now());
        adapter.write(&replacement).await.unwrap();

        assert_eq!(adapter.rows().await, vec![row(&["new"]), row(&["rows"])]);
        assert_eq!(adapter.write_count(), 1);
    }

    #[tokio::test]
    async fn write_stamps_modification_time() {
        let adapter = MemoryAdapter::new();
        assert_eq!(adapter.last_modified().await.unwrap(), None);

        let snapshot = TableSnapshot::new(vec![row(&["x"])], Utc::now());
        adapter.write(&snapshot).await.unwrap();

        assert!(adapter.last_modified().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_write_leaves_contents_unchanged() {
        let adapter = MemoryAdapter::new();
        adapter.set_rows(vec![row(&["keep"])]).await;
        adapter.fail_writes(true).await;

        let snapshot = TableSnapshot::new(vec![row(&["lost"])], Utc::now());
        let result = adapter.write(&snapshot).await;

        assert!(result.is_err());
        assert_eq!(adapter.rows().await, vec![row(&["keep"])]);
    }

    #[tokio::test]
    async fn injected_read_failure() {
        let adapter = MemoryAdapter::new();
        adapter.fail_reads(true).await;

        assert!(matches!(
            adapter.read().await,
            Err(AdapterError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn status_is_settable() {
        let adapter = MemoryAdapter::new();
        assert_eq!(adapter.status().await, AdapterStatus::Ok);

        adapter.set_status(AdapterStatus::NotConfigured).await;
        assert_eq!(adapter.status().await, AdapterStatus::NotConfigured);
    }

    #[test]
    fn status_wire_strings() {
        assert_eq!(serde_json::to_string(&AdapterStatus::Ok).unwrap(), "\"OK\"");
        assert_eq!(
            serde_json::to_string(&AdapterStatus::NotConfigured).unwrap(),
            "\"Not configured\""
        );
        assert_eq!(
            serde_json::to_string(&AdapterStatus::Error).unwrap(),
            "\"Error\""
        );
    }
}
