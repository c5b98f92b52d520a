//! Point-in-time table captures.
//!
//! A snapshot is the only data shape the engine reasons about: adapters
//! materialize whatever their remote API returns into one of these, fully,
//! or fail. Snapshots are immutable once constructed; transformations
//! produce new snapshots.

use crate::cell::CellValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The full contents of one store's table at one read instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    /// Ordered rows of ordered cells. Order is significant: no implicit
    /// sorting anywhere between read and fingerprint.
    rows: Vec<Vec<CellValue>>,
    /// When the read happened (engine/adapter-assigned, never store-assigned).
    captured_at: DateTime<Utc>,
    /// The store's own last-modified timestamp, when it can report one.
    source_modified_at: Option<DateTime<Utc>>,
}

impl TableSnapshot {
    /// Create a snapshot from materialized rows.
    pub fn new(rows: Vec<Vec<CellValue>>, captured_at: DateTime<Utc>) -> Self {
        Self {
            rows,
            captured_at,
            source_modified_at: None,
        }
    }

    /// A new snapshot with the store-reported modification timestamp set.
    pub fn with_source_modified_at(mut self, modified_at: Option<DateTime<Utc>>) -> Self {
        self.source_modified_at = modified_at;
        self
    }

    /// The table rows, in store order.
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns, taken as the widest row. Remote APIs trim
    /// trailing blanks per row, so widths can be ragged within one table.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether the table holds no rows at all.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// When this snapshot was read.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// The store-reported modification timestamp, if any.
    pub fn source_modified_at(&self) -> Option<DateTime<Utc>> {
        self.source_modified_at
    }

    /// The timestamp used for direction decisions: the store-reported
    /// modification time, or the capture instant as a fallback proxy when
    /// the store cannot report one.
    pub fn effective_modified_at(&self) -> DateTime<Utc> {
        self.source_modified_at.unwrap_or(self.captured_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cells(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::Text(v.to_string())).collect()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn derived_shape_counts() {
        let snapshot = TableSnapshot::new(
            vec![cells(&["a", "b", "c"]), cells(&["d"])],
            at(1_000),
        );

        assert_eq!(snapshot.row_count(), 2);
        assert_eq!(snapshot.column_count(), 3);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn empty_table() {
        let snapshot = TableSnapshot::new(vec![], at(1_000));
        assert_eq!(snapshot.row_count(), 0);
        assert_eq!(snapshot.column_count(), 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn effective_timestamp_prefers_source() {
        let snapshot = TableSnapshot::new(vec![], at(1_000))
            .with_source_modified_at(Some(at(500)));

        assert_eq!(snapshot.effective_modified_at(), at(500));
    }

    #[test]
    fn effective_timestamp_falls_back_to_capture() {
        let snapshot = TableSnapshot::new(vec![], at(1_000));

        assert_eq!(snapshot.source_modified_at(), None);
        assert_eq!(snapshot.effective_modified_at(), at(1_000));
    }

    #[test]
    fn with_source_modified_at_builds_new_snapshot() {
        let base = TableSnapshot::new(vec![cells(&["x"])], at(1_000));
        let stamped = base.clone().with_source_modified_at(Some(at(2_000)));

        assert_eq!(base.source_modified_at(), None);
        assert_eq!(stamped.source_modified_at(), Some(at(2_000)));
        assert_eq!(base.rows(), stamped.rows());
    }

    #[test]
    fn serialization_roundtrip() {
        let snapshot = TableSnapshot::new(
            vec![vec![
                CellValue::Text("x".to_string()),
                CellValue::Number(1.0),
                CellValue::Empty,
            ]],
            at(1_000),
        )
        .with_source_modified_at(Some(at(900)));

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("capturedAt")); // camelCase
        assert!(json.contains("sourceModifiedAt"));

        let parsed: TableSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, parsed);
    }
}
