//! One-shot reconciliation cycles over two store adapters.
//!
//! # Cycle shape
//!
//! 1. Read both stores concurrently (each call bounded by a timeout and a
//!    bounded retry policy); either failure aborts the cycle before any write
//! 2. Fingerprint both snapshots; equal fingerprints end the cycle as a no-op
//! 3. Apply the direction policy; a timestamp tie aborts as ambiguous
//! 4. Replace the losing side's contents wholesale with the winner's rows
//!
//! Cycles never interleave: a semaphore scoped to the engine instance is
//! held for the whole cycle and released on every exit path. The cycle body
//! runs in a spawned task so a disconnecting caller cannot abort a
//! half-issued remote write.

use crate::adapter::{AdapterError, AdapterStatus, SourceAdapter};
use crate::cell::Normalization;
use crate::decision::{decide, Decision, Direction, Side};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprinter;
use crate::snapshot::TableSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Bounded retry with exponential backoff for remote calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first. Minimum 1.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Backoff multiplier between retries.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for each individual remote call (read, write, last-modified).
    pub timeout_per_call: Duration,
    /// Retry policy applied to each remote call.
    pub retry: RetryPolicy,
    /// Cell normalization rule, applied identically to both sides.
    pub normalization: Normalization,
    /// Cycles allowed in flight at once. The default of 1 serializes
    /// cycles; higher values are only safe when an engine's store pairs are
    /// disjoint.
    pub max_concurrent_cycles: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_per_call: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            normalization: Normalization::default(),
            max_concurrent_cycles: 1,
        }
    }
}

/// The outcome record of one cycle, surfaced to callers.
///
/// Created fresh each cycle, immutable, never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Whether the cycle reached a terminal success (including no-op).
    pub success: bool,
    /// Human-readable outcome description. Never carries credentials.
    pub message: String,
    /// Which store's data overwrote the other's, if any.
    pub direction: Direction,
    /// When the cycle finished.
    pub timestamp: DateTime<Utc>,
}

impl SyncResult {
    fn succeeded(direction: Direction, message: String) -> Self {
        Self {
            success: true,
            message,
            direction,
            timestamp: Utc::now(),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
            direction: Direction::None,
            timestamp: Utc::now(),
        }
    }
}

/// How a completed cycle ended.
enum CycleReport {
    /// Fingerprints matched; nothing written.
    Converged,
    /// The winner's rows replaced the loser's contents.
    Synced { direction: Direction, rows: usize },
}

/// Orchestrates sync cycles between two stores.
///
/// Stateless across cycles: nothing observed in one `run_once` affects the
/// next. The only cross-cycle state is the in-flight guard.
pub struct ReconciliationEngine {
    store_a: Arc<dyn SourceAdapter>,
    store_b: Arc<dyn SourceAdapter>,
    config: EngineConfig,
    cycle_permits: Arc<Semaphore>,
}

impl ReconciliationEngine {
    /// Create an engine over two store adapters.
    pub fn new(
        store_a: Arc<dyn SourceAdapter>,
        store_b: Arc<dyn SourceAdapter>,
        config: EngineConfig,
    ) -> Self {
        let permits = config.max_concurrent_cycles.max(1);
        Self {
            store_a,
            store_b,
            config,
            cycle_permits: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Run one sync cycle.
    ///
    /// Returns `Err(Error::CycleInFlight)` only when the engine is busy;
    /// every terminal cycle outcome - converged, synced, or failed - comes
    /// back as an `Ok(SyncResult)` for the caller to inspect.
    pub async fn run_once(&self) -> Result<SyncResult> {
        let permit = self
            .cycle_permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| Error::CycleInFlight)?;

        // The cycle owns its permit inside a spawned task: if the caller
        // goes away, in-flight remote calls still run to completion or
        // timeout instead of aborting mid-write.
        let runner = CycleRunner {
            store_a: Arc::clone(&self.store_a),
            store_b: Arc::clone(&self.store_b),
            fingerprinter: Fingerprinter::new(self.config.normalization),
            config: self.config.clone(),
        };
        let handle = tokio::spawn(async move {
            let _permit = permit;
            runner.run().await
        });

        match handle.await {
            Ok(Ok(CycleReport::Converged)) => {
                tracing::info!("cycle complete: no differences found");
                Ok(SyncResult::succeeded(
                    Direction::None,
                    "no differences found".to_string(),
                ))
            }
            Ok(Ok(CycleReport::Synced { direction, rows })) => {
                let message = format!("synced {rows} rows ({direction})");
                tracing::info!(%direction, rows, "cycle complete: stores converged by overwrite");
                Ok(SyncResult::succeeded(direction, message))
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "cycle failed");
                Ok(SyncResult::failed(err.to_string()))
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "cycle task aborted");
                Ok(SyncResult::failed("sync cycle task aborted".to_string()))
            }
        }
    }

    /// Both adapters' health, for the status surface.
    pub async fn statuses(&self) -> (AdapterStatus, AdapterStatus) {
        tokio::join!(self.store_a.status(), self.store_b.status())
    }
}

/// Owns everything one spawned cycle needs, independent of the engine's
/// lifetime.
struct CycleRunner {
    store_a: Arc<dyn SourceAdapter>,
    store_b: Arc<dyn SourceAdapter>,
    fingerprinter: Fingerprinter,
    config: EngineConfig,
}

impl CycleRunner {
    fn adapter(&self, side: Side) -> &Arc<dyn SourceAdapter> {
        match side {
            Side::A => &self.store_a,
            Side::B => &self.store_b,
        }
    }

    async fn run(&self) -> Result<CycleReport> {
        // No data dependency between the two reads; only the join point
        // matters. Nothing may be written until both have landed.
        let (a, b) = tokio::join!(self.observe(Side::A), self.observe(Side::B));
        let (a, b) = (a?, b?);

        let fingerprint_a = self.fingerprinter.fingerprint(&a);
        let fingerprint_b = self.fingerprinter.fingerprint(&b);
        tracing::debug!(
            fp_a = %fingerprint_a,
            fp_b = %fingerprint_b,
            rows_a = a.row_count(),
            rows_b = b.row_count(),
            "both stores observed"
        );

        match decide(
            fingerprint_a,
            fingerprint_b,
            a.effective_modified_at(),
            b.effective_modified_at(),
        ) {
            Decision::NoOp => Ok(CycleReport::Converged),
            Decision::Ambiguous => Err(Error::AmbiguousConflict),
            Decision::WriteAToB => {
                self.overwrite(Side::B, &a).await?;
                Ok(CycleReport::Synced {
                    direction: Direction::AToB,
                    rows: a.row_count(),
                })
            }
            Decision::WriteBToA => {
                self.overwrite(Side::A, &b).await?;
                Ok(CycleReport::Synced {
                    direction: Direction::BToA,
                    rows: b.row_count(),
                })
            }
        }
    }

    /// Read one side fully: table contents plus best-effort modification
    /// timestamp. Any failure here is a read failure for the whole cycle.
    async fn observe(&self, side: Side) -> Result<TableSnapshot> {
        let adapter = self.adapter(side);

        let snapshot = self
            .call_with_retry(side, "read", || adapter.read())
            .await
            .map_err(|cause| Error::ReadFailure { side, cause })?;

        let modified_at = self
            .call_with_retry(side, "last_modified", || adapter.last_modified())
            .await
            .map_err(|cause| Error::ReadFailure { side, cause })?;

        Ok(snapshot.with_source_modified_at(modified_at))
    }

    async fn overwrite(&self, loser: Side, winner: &TableSnapshot) -> Result<()> {
        tracing::info!(
            %loser,
            rows = winner.row_count(),
            "overwriting stale store with winner's contents"
        );
        let adapter = self.adapter(loser);
        self.call_with_retry(loser, "write", || adapter.write(winner))
            .await
            .map_err(|cause| Error::WriteFailure { side: loser, cause })
    }

    /// Run one remote call under the per-call deadline, retrying per policy.
    async fn call_with_retry<T, F, Fut>(
        &self,
        side: Side,
        what: &'static str,
        mut call: F,
    ) -> std::result::Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, AdapterError>>,
    {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut backoff = self.config.retry.initial_backoff;
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.config.timeout_per_call, call()).await {
                Ok(result) => result,
                Err(_) => Err(AdapterError::Timeout(self.config.timeout_per_call)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                // A missing configuration cannot heal between attempts.
                Err(AdapterError::NotConfigured) => return Err(AdapterError::NotConfigured),
                Err(err) if attempt < max_attempts => {
                    tracing::warn!(%side, what, attempt, error = %err, "remote call failed; retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.mul_f64(self.config.retry.backoff_factor);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::cell::CellValue;
    use chrono::TimeZone;

    fn row(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::Text(v.to_string())).collect()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn quick_config() -> EngineConfig {
        EngineConfig {
            timeout_per_call: Duration::from_millis(200),
            retry: RetryPolicy::none(),
            ..EngineConfig::default()
        }
    }

    fn engine(
        a: &Arc<MemoryAdapter>,
        b: &Arc<MemoryAdapter>,
        config: EngineConfig,
    ) -> Arc<ReconciliationEngine> {
        Arc::new(ReconciliationEngine::new(
            Arc::clone(a) as Arc<dyn SourceAdapter>,
            Arc::clone(b) as Arc<dyn SourceAdapter>,
            config,
        ))
    }

    #[tokio::test]
    async fn identical_stores_are_a_noop() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let engine = engine(&a, &b, quick_config());

        let result = engine.run_once().await.unwrap();

        assert!(result.success);
        assert_eq!(result.direction, Direction::None);
        assert_eq!(result.message, "no differences found");
        assert_eq!(a.write_count(), 0);
        assert_eq!(b.write_count(), 0);
    }

    #[tokio::test]
    async fn newer_side_overwrites_the_other() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "2"])]));
        a.set_modified_at(Some(at(2_000))).await;
        b.set_modified_at(Some(at(1_000))).await;
        let engine = engine(&a, &b, quick_config());

        let result = engine.run_once().await.unwrap();

        assert!(result.success);
        assert_eq!(result.direction, Direction::AToB);
        assert_eq!(result.message, "synced 1 rows (A to B)");
        assert_eq!(b.rows().await, vec![row(&["x", "1"])]);
        assert_eq!(a.write_count(), 0);
        assert_eq!(b.write_count(), 1);
    }

    #[tokio::test]
    async fn direction_reverses_when_b_is_newer() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "2"])]));
        a.set_modified_at(Some(at(1_000))).await;
        b.set_modified_at(Some(at(2_000))).await;
        let engine = engine(&a, &b, quick_config());

        let result = engine.run_once().await.unwrap();

        assert_eq!(result.direction, Direction::BToA);
        assert_eq!(a.rows().await, vec![row(&["x", "2"])]);
        assert_eq!(b.write_count(), 0);
    }

    #[tokio::test]
    async fn second_cycle_after_sync_is_a_noop() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "2"])]));
        a.set_modified_at(Some(at(2_000))).await;
        b.set_modified_at(Some(at(1_000))).await;
        let engine = engine(&a, &b, quick_config());

        let first = engine.run_once().await.unwrap();
        assert_eq!(first.direction, Direction::AToB);

        let second = engine.run_once().await.unwrap();
        assert!(second.success);
        assert_eq!(second.direction, Direction::None);
        assert_eq!(b.write_count(), 1); // no further writes
    }

    #[tokio::test]
    async fn read_failure_prevents_all_writes() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "2"])]));
        a.fail_reads(true).await;
        let engine = engine(&a, &b, quick_config());

        let result = engine.run_once().await.unwrap();

        assert!(!result.success);
        assert_eq!(result.direction, Direction::None);
        assert!(result.message.contains("reading store A failed"));
        assert_eq!(a.write_count(), 0);
        assert_eq!(b.write_count(), 0);
    }

    #[tokio::test]
    async fn metadata_failure_is_a_read_failure() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "2"])]));
        b.fail_metadata(true).await;
        let engine = engine(&a, &b, quick_config());

        let result = engine.run_once().await.unwrap();

        assert!(!result.success);
        assert!(result.message.contains("reading store B failed"));
        assert_eq!(a.write_count(), 0);
        assert_eq!(b.write_count(), 0);
    }

    #[tokio::test]
    async fn timestamp_tie_is_ambiguous_with_no_writes() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "2"])]));
        a.set_modified_at(Some(at(1_000))).await;
        b.set_modified_at(Some(at(1_000))).await;
        let engine = engine(&a, &b, quick_config());

        let result = engine.run_once().await.unwrap();

        assert!(!result.success);
        assert_eq!(result.direction, Direction::None);
        assert!(result.message.contains("neither side is strictly newer"));
        assert_eq!(a.write_count(), 0);
        assert_eq!(b.write_count(), 0);
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "2"])]));
        a.set_modified_at(Some(at(2_000))).await;
        b.set_modified_at(Some(at(1_000))).await;
        b.fail_writes(true).await;
        let engine = engine(&a, &b, quick_config());

        let result = engine.run_once().await.unwrap();

        assert!(!result.success);
        assert!(result.message.contains("writing store B failed"));
        assert_eq!(b.rows().await, vec![row(&["x", "2"])]); // prior state intact
    }

    #[tokio::test]
    async fn slow_read_times_out_as_read_failure() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "1"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x", "2"])]));
        a.set_read_delay(Some(Duration::from_millis(100))).await;

        let config = EngineConfig {
            timeout_per_call: Duration::from_millis(10),
            retry: RetryPolicy::none(),
            ..EngineConfig::default()
        };
        let engine = engine(&a, &b, config);

        let result = engine.run_once().await.unwrap();

        assert!(!result.success);
        assert!(result.message.contains("timed out"));
        assert_eq!(a.write_count(), 0);
        assert_eq!(b.write_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_cycle_is_rejected_as_busy() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x"])]));
        a.set_read_delay(Some(Duration::from_millis(150))).await;
        let engine = engine(&a, &b, quick_config());

        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_once().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        let second = engine.run_once().await;
        assert!(matches!(second, Err(Error::CycleInFlight)));

        let first = first.await.unwrap().unwrap();
        assert!(first.success);
    }

    #[tokio::test]
    async fn engine_frees_after_cycle_completes() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x"])]));
        let engine = engine(&a, &b, quick_config());

        assert!(engine.run_once().await.is_ok());
        assert!(engine.run_once().await.is_ok());
    }

    #[tokio::test]
    async fn transient_read_failure_recovers_under_retry() {
        let a = Arc::new(MemoryAdapter::with_rows(vec![row(&["x"])]));
        let b = Arc::new(MemoryAdapter::with_rows(vec![row(&["x"])]));
        a.fail_reads(true).await;

        let config = EngineConfig {
            timeout_per_call: Duration::from_millis(200),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(20),
                backoff_factor: 1.0,
            },
            ..EngineConfig::default()
        };
        let engine = engine(&a, &b, config);

        // Heal the store while the engine is backing off.
        {
            let a = Arc::clone(&a);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                a.fail_reads(false).await;
            });
        }

        let result = engine.run_once().await.unwrap();
        assert!(result.success);
        assert!(a.read_count() >= 2);
    }

    #[tokio::test]
    async fn statuses_reflect_both_adapters() {
        let a = Arc::new(MemoryAdapter::new());
        let b = Arc::new(MemoryAdapter::new());
        b.set_status(AdapterStatus::NotConfigured).await;
        let engine = engine(&a, &b, quick_config());

        let (status_a, status_b) = engine.statuses().await;
        assert_eq!(status_a, AdapterStatus::Ok);
        assert_eq!(status_b, AdapterStatus::NotConfigured);
    }

    #[test]
    fn sync_result_wire_shape() {
        let result = SyncResult {
            success: true,
            message: "synced 2 rows (A to B)".to_string(),
            direction: Direction::AToB,
            timestamp: at(1_700_000_000),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["direction"], "aToB");
        assert!(json["timestamp"].as_str().unwrap().contains('T')); // ISO 8601
    }
}
