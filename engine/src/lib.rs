//! # Tandem Engine
//!
//! The reconciliation core for two-store table synchronization.
//!
//! This crate decides whether two independently-owned tabular stores hold the
//! same data, which side should win when they differ, and whether a write is
//! necessary at all. Everything IO-shaped is pushed behind the
//! [`SourceAdapter`] port; the decision logic itself is pure and
//! deterministic - the same inputs always produce the same outputs.
//!
//! ## Design Principles
//!
//! - **Fail-safe**: no write is ever derived from a partial read
//! - **Deterministic**: equality and direction decisions are pure functions
//! - **Conservative**: ambiguous conflicts are reported, never guessed away
//! - **Stateless**: each sync cycle is independent of every prior cycle
//!
//! ## Core Concepts
//!
//! ### Snapshots
//!
//! A [`TableSnapshot`] is an immutable capture of one store's full table at
//! one read instant: ordered rows of [`CellValue`]s plus the capture
//! timestamp and, when the store can report one, its own modification
//! timestamp.
//!
//! ### Fingerprints
//!
//! The [`Fingerprinter`] reduces a snapshot to a 256-bit content hash over
//! row and cell data only. Two snapshots with identical cell contents in
//! identical order always produce identical fingerprints, no matter when or
//! from which store they were read. Numeric cells are canonicalized first so
//! `1` and `1.0` cannot produce spuriously different hashes.
//!
//! ### Decision policy
//!
//! [`decide`] maps two fingerprints and two effective modification
//! timestamps to a [`Decision`]: converged tables are a no-op, a strictly
//! newer side wins wholesale, and a timestamp tie refuses with an ambiguous
//! conflict rather than flipping a coin over someone's data.
//!
//! ### The engine
//!
//! [`ReconciliationEngine::run_once`] runs one full cycle: both sides are
//! read concurrently under per-call timeouts, fingerprinted, the policy is
//! applied, and at most one wholesale write is issued to the losing side.
//! Cycles never interleave; a concurrent request is rejected as busy.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use tandem_engine::{CellValue, Fingerprinter, TableSnapshot};
//!
//! let rows = vec![vec![CellValue::Text("x".into()), CellValue::Number(1.0)]];
//!
//! // Capture instants differ; contents do not.
//! let first = TableSnapshot::new(rows.clone(), Utc::now());
//! let second = TableSnapshot::new(rows, Utc::now());
//!
//! let fingerprinter = Fingerprinter::default();
//! assert_eq!(
//!     fingerprinter.fingerprint(&first),
//!     fingerprinter.fingerprint(&second),
//! );
//! ```
//!
//! Running a full cycle against two stores:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tandem_engine::{EngineConfig, MemoryAdapter, ReconciliationEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store_a = Arc::new(MemoryAdapter::new());
//!     let store_b = Arc::new(MemoryAdapter::new());
//!
//!     let engine = Arc::new(ReconciliationEngine::new(
//!         store_a,
//!         store_b,
//!         EngineConfig::default(),
//!     ));
//!
//!     let result = engine.run_once().await.expect("cycle rejected as busy");
//!     println!("{}", result.message);
//! }
//! ```

pub mod adapter;
pub mod cell;
pub mod decision;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod snapshot;

// Re-export main types at crate root
pub use adapter::{AdapterError, AdapterStatus, MemoryAdapter, SourceAdapter};
pub use cell::{CellValue, Normalization};
pub use decision::{decide, Decision, Direction, Side};
pub use engine::{EngineConfig, ReconciliationEngine, RetryPolicy, SyncResult};
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, Fingerprinter};
pub use snapshot::TableSnapshot;
