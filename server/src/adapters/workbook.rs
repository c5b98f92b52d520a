//! Store B: Microsoft-Graph-style workbook API adapter.
//!
//! Reads pull the worksheet's used range (or a configured one). Writes
//! replace contents in three steps: look up the currently used range, clear
//! it, then patch a freshly computed A1 range with the new values. The
//! workbook range API is strictly rectangular, so ragged rows are padded
//! with blanks before the patch.

use super::{check_status, parse_timestamp, rows_from_values, transport_error};
use crate::config::WorkbookConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_engine::{AdapterError, AdapterStatus, CellValue, SourceAdapter, TableSnapshot};

/// Workbook range payload for reads and used-range lookups.
#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Workbook range payload for patches.
#[derive(Debug, Serialize)]
struct RangeBody {
    values: Vec<Vec<CellValue>>,
}

/// Drive item payload for last-modified probes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItem {
    last_modified_date_time: Option<String>,
}

/// Adapter for the drive workbook API.
pub struct WorkbookAdapter {
    client: reqwest::Client,
    config: Option<WorkbookConfig>,
}

impl WorkbookAdapter {
    pub fn new(client: reqwest::Client, config: Option<WorkbookConfig>) -> Self {
        Self { client, config }
    }

    fn config(&self) -> Result<&WorkbookConfig, AdapterError> {
        self.config.as_ref().ok_or(AdapterError::NotConfigured)
    }

    fn worksheet_url(&self, config: &WorkbookConfig, suffix: &str) -> String {
        format!(
            "{}/me/drive/items/{}/workbook/worksheets/{}{}",
            config.api_base, config.drive_item_id, config.worksheet, suffix
        )
    }

    /// The range to read: an explicitly configured address, or whatever the
    /// worksheet currently uses.
    fn read_url(&self, config: &WorkbookConfig) -> String {
        match &config.range {
            Some(range) => self.worksheet_url(config, &format!("/range(address='{range}')")),
            None => self.worksheet_url(config, "/usedRange"),
        }
    }

    async fn get_range(&self, url: &str, token: &str) -> Result<RangeResponse, AdapterError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|err| AdapterError::InvalidData(err.to_string()))
    }
}

#[async_trait]
impl SourceAdapter for WorkbookAdapter {
    async fn read(&self) -> Result<TableSnapshot, AdapterError> {
        let config = self.config()?;
        let range = self.get_range(&self.read_url(config), &config.token).await?;

        tracing::debug!(rows = range.values.len(), "workbook range read");
        Ok(TableSnapshot::new(
            rows_from_values(&range.values),
            Utc::now(),
        ))
    }

    async fn write(&self, snapshot: &TableSnapshot) -> Result<(), AdapterError> {
        let config = self.config()?;

        // 1. Find what is currently populated, so the clear covers it all.
        let used = self
            .get_range(
                &self.worksheet_url(config, "/usedRange?$select=address"),
                &config.token,
            )
            .await?;

        // 2. Clear it.
        if let Some(address) = used.address.as_deref().map(strip_sheet_prefix) {
            let clear_url =
                self.worksheet_url(config, &format!("/range(address='{address}')/clear"));
            let response = self
                .client
                .post(&clear_url)
                .bearer_auth(&config.token)
                .json(&serde_json::json!({ "applyTo": "Contents" }))
                .send()
                .await
                .map_err(transport_error)?;
            check_status(response).await?;
        }

        // 3. Patch the new contents into a range of exactly their shape.
        if snapshot.row_count() > 0 {
            let address = a1_range(snapshot.row_count(), snapshot.column_count().max(1));
            let patch_url =
                self.worksheet_url(config, &format!("/range(address='{address}')"));
            let response = self
                .client
                .patch(&patch_url)
                .bearer_auth(&config.token)
                .json(&RangeBody {
                    values: rectangular(snapshot),
                })
                .send()
                .await
                .map_err(transport_error)?;
            check_status(response).await?;
        }

        tracing::debug!(rows = snapshot.row_count(), "workbook contents replaced");
        Ok(())
    }

    async fn last_modified(&self) -> Result<Option<DateTime<Utc>>, AdapterError> {
        let config = self.config()?;
        let url = format!(
            "{}/me/drive/items/{}?$select=lastModifiedDateTime",
            config.api_base, config.drive_item_id
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&config.token)
            .send()
            .await
            .map_err(transport_error)?;

        if matches!(response.status().as_u16(), 403 | 404) {
            tracing::debug!("drive item metadata unavailable; no modified time reported");
            return Ok(None);
        }
        let response = check_status(response).await?;

        let item: DriveItem = response
            .json()
            .await
            .map_err(|err| AdapterError::InvalidData(err.to_string()))?;

        match item.last_modified_date_time {
            Some(raw) => Ok(Some(parse_timestamp(&raw)?)),
            None => Ok(None),
        }
    }

    async fn status(&self) -> AdapterStatus {
        if self.config.is_some() {
            AdapterStatus::Ok
        } else {
            AdapterStatus::NotConfigured
        }
    }
}

/// Used-range addresses come back sheet-qualified (`Sheet1!A1:C4`); range
/// calls on the worksheet path want the bare part.
fn strip_sheet_prefix(address: &str) -> &str {
    match address.rsplit_once('!') {
        Some((_, bare)) => bare,
        None => address,
    }
}

/// A1 address of a `rows` x `cols` block anchored at the sheet origin.
fn a1_range(rows: usize, cols: usize) -> String {
    format!("A1:{}{}", column_label(cols), rows)
}

/// Spreadsheet column label for a 1-indexed column number (A, B, .., Z, AA).
fn column_label(mut column: usize) -> String {
    let mut label = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        label.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_else(|_| "A".to_string())
}

/// Pad ragged rows with blanks so the patch body is rectangular.
fn rectangular(snapshot: &TableSnapshot) -> Vec<Vec<CellValue>> {
    let width = snapshot.column_count().max(1);
    snapshot
        .rows()
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.resize(width, CellValue::Empty);
            row
        })
        .collect()
}
