use super::{SheetStore, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::sheet::{a1_cell, a1_sheet, CellRef};
use std::time::Duration;
use tracing::{info, warn};

/// Google Sheets v4 values API.
#[derive(Clone)]
pub struct GoogleSheets {
    client: Client,
    api_base: String,
    spreadsheet_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheets {
    pub fn new(api_base: String, spreadsheet_id: String, token: String) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent("class-leaderboard/0.1")
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            api_base,
            spreadsheet_id,
            token,
        })
    }

    /// `{base}/{spreadsheet}/values/{range}{suffix}` with query pairs.
    fn values_url(&self, range: &str, suffix: &str, query: &[(&str, &str)]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::Malformed(format!("bad api base {}: {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Malformed(format!("api base {} cannot hold a path", self.api_base)))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", range, suffix));
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn check(sheet: &str, resp: Response) -> Result<Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        warn!("Sheets API returned {} for {}: {}", status, sheet, body);
        if status.as_u16() == 400 && body.contains("Unable to parse range") {
            return Err(StoreError::UnknownSheet(sheet.to_string()));
        }
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Render an unformatted cell value the way it reads in the sheet.
fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetStore for GoogleSheets {
    async fn read_grid(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.values_url(
            &a1_sheet(sheet),
            "",
            &[
                ("valueRenderOption", "UNFORMATTED_VALUE"),
                // Date cells arrive as day serials, decoded by `shared::audit`
                ("dateTimeRenderOption", "SERIAL_NUMBER"),
                ("majorDimension", "ROWS"),
            ],
        )?;
        let resp = self.client.get(url).bearer_auth(&self.token).send().await?;
        let range: ValueRange = Self::check(sheet, resp).await?.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn write_cell(&self, sheet: &str, at: CellRef, value: u64) -> Result<(), StoreError> {
        let range = a1_cell(sheet, at);
        let url = self.values_url(&range, "", &[("valueInputOption", "RAW")])?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });
        let resp = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check(sheet, resp).await?;
        info!("Wrote {} to {}", value, range);
        Ok(())
    }

    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), StoreError> {
        let url = self.values_url(
            &a1_sheet(sheet),
            ":append",
            &[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")],
        )?;
        let body = json!({ "majorDimension": "ROWS", "values": [row] });
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check(sheet, resp).await?;
        Ok(())
    }
}
