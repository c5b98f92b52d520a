//! HTTP adapters for the two remote stores.
//!
//! Each adapter materializes its store's loosely-typed API payload into the
//! engine's cell model on read, and replaces the store's visible contents
//! wholesale on write. Everything credential-shaped stays inside this
//! module; error details forwarded upward never include tokens.

mod sheets;
mod workbook;

pub use sheets::SheetsAdapter;
pub use workbook::WorkbookAdapter;

use tandem_engine::{AdapterError, CellValue};

/// Normalize a values-API payload (rows of raw JSON scalars) into cells.
fn rows_from_values(values: &[Vec<serde_json::Value>]) -> Vec<Vec<CellValue>> {
    values
        .iter()
        .map(|row| row.iter().map(CellValue::from_json).collect())
        .collect()
}

/// Map a client-level failure (connect, DNS, body read) to the adapter
/// vocabulary.
fn transport_error(err: reqwest::Error) -> AdapterError {
    AdapterError::Transport(err.without_url().to_string())
}

/// Reject non-success responses, keeping a bounded slice of the body as
/// detail.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response.text().await.unwrap_or_default();
    Err(AdapterError::Api {
        status: status.as_u16(),
        detail: truncated(&detail),
    })
}

/// Store error bodies can be pages long; logs and sync messages only need
/// the head.
fn truncated(detail: &str) -> String {
    const LIMIT: usize = 200;
    if detail.len() <= LIMIT {
        detail.to_string()
    } else {
        let cut = detail
            .char_indices()
            .take_while(|(i, _)| *i < LIMIT)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &detail[..cut])
    }
}

/// Parse an RFC 3339 timestamp from store metadata.
fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, AdapterError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|err| AdapterError::InvalidData(format!("bad timestamp '{raw}': {err}")))
}
