//! Store A: Google-Sheets-style values API adapter.
//!
//! Reads pull the configured range with unformatted values so numbers come
//! back typed. Writes are the values API's full-replace sequence: clear the
//! range, then update it in one request. Last-modified comes from the Drive
//! metadata endpoint and degrades to "unreported" when the token's scope
//! cannot see it.

use super::{check_status, parse_timestamp, rows_from_values, transport_error};
use crate::config::SheetsConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_engine::{AdapterError, AdapterStatus, CellValue, SourceAdapter, TableSnapshot};

/// Values-API payload for ranged reads.
#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Values-API payload for ranged updates.
#[derive(Debug, Serialize)]
struct ValuesBody<'a> {
    values: &'a [Vec<CellValue>],
}

/// Drive metadata payload for last-modified probes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata {
    modified_time: Option<String>,
}

/// Adapter for the spreadsheet values API.
pub struct SheetsAdapter {
    client: reqwest::Client,
    config: Option<SheetsConfig>,
}

impl SheetsAdapter {
    pub fn new(client: reqwest::Client, config: Option<SheetsConfig>) -> Self {
        Self { client, config }
    }

    fn config(&self) -> Result<&SheetsConfig, AdapterError> {
        self.config.as_ref().ok_or(AdapterError::NotConfigured)
    }

    fn values_url(&self, config: &SheetsConfig, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            config.api_base, config.spreadsheet_id, config.range, suffix
        )
    }
}

#[async_trait]
impl SourceAdapter for SheetsAdapter {
    async fn read(&self) -> Result<TableSnapshot, AdapterError> {
        let config = self.config()?;
        let url = self.values_url(config, "?valueRenderOption=UNFORMATTED_VALUE");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&config.token)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let body: ValuesResponse = response
            .json()
            .await
            .map_err(|err| AdapterError::InvalidData(err.to_string()))?;

        tracing::debug!(rows = body.values.len(), "sheets range read");
        Ok(TableSnapshot::new(
            rows_from_values(&body.values),
            Utc::now(),
        ))
    }

    async fn write(&self, snapshot: &TableSnapshot) -> Result<(), AdapterError> {
        let config = self.config()?;

        // The values API has no transactional replace; clear-then-update is
        // the closest it offers. The engine's single-flight guard keeps the
        // two calls from interleaving with another cycle.
        let clear_url = self.values_url(config, ":clear");
        let response = self
            .client
            .post(&clear_url)
            .bearer_auth(&config.token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;

        let update_url = self.values_url(config, "?valueInputOption=RAW");
        let response = self
            .client
            .put(&update_url)
            .bearer_auth(&config.token)
            .json(&ValuesBody {
                values: snapshot.rows(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;

        tracing::debug!(rows = snapshot.row_count(), "sheets range replaced");
        Ok(())
    }

    async fn last_modified(&self) -> Result<Option<DateTime<Utc>>, AdapterError> {
        let config = self.config()?;
        let url = format!(
            "{}/files/{}?fields=modifiedTime",
            config.drive_api_base, config.spreadsheet_id
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&config.token)
            .send()
            .await
            .map_err(transport_error)?;

        // A token scoped only to the values API cannot see Drive metadata;
        // that store simply cannot report a timestamp.
        if matches!(response.status().as_u16(), 403 | 404) {
            tracing::debug!("drive metadata unavailable; no modified time reported");
            return Ok(None);
        }
        let response = check_status(response).await?;

        let metadata: FileMetadata = response
            .json()
            .await
            .map_err(|err| AdapterError::InvalidData(err.to_string()))?;

        match metadata.modified_time {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> SheetsAdapter {
        SheetsAdapter::new(
            reqwest::Client::new(),
            Some(SheetsConfig {
                api_base: "https://sheets.example".to_string(),
                drive_api_base: "https://drive.example".to_string(),
                spreadsheet_id: "sheet-123".to_string(),
                range: "Sheet1!A:C".to_string(),
                token: "secret".to_string(),
            }),
        )
    }

    #[test]
    fn values_urls_include_range_and_suffix() {
        let adapter = configured();
        let config = adapter.config().unwrap();

        assert_eq!(
            adapter.values_url(config, ":clear"),
            "https://sheets.example/v4/spreadsheets/sheet-123/values/Sheet1!A:C:clear"
        );
        assert_eq!(
            adapter.values_url(config, "?valueInputOption=RAW"),
            "https://sheets.example/v4/spreadsheets/sheet-123/values/Sheet1!A:C?valueInputOption=RAW"
        );
    }

    #[test]
    fn values_response_tolerates_missing_values_key() {
        // An empty range omits "values" entirely.
        let body: ValuesResponse = serde_json::from_str("{\"range\": \"Sheet1!A:C\"}").unwrap();
        assert!(body.values.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_adapter_reports_and_refuses() {
        let adapter = SheetsAdapter::new(reqwest::Client::new(), None);

        assert_eq!(adapter.status().await, AdapterStatus::NotConfigured);
        assert_eq!(adapter.read().await, Err(AdapterError::NotConfigured));
        assert_eq!(
            adapter.last_modified().await,
            Err(AdapterError::NotConfigured)
        );
    }
}
