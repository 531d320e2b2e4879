//! Google Sheets report sink

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::channel::Channel;
use crate::checker::StatusRow;
use crate::config::{ClientGroup, SheetsConfig};
use crate::io::HttpClient;
use crate::notifier::ReportSink;
use crate::transition::Transition;

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Appends a timestamped report block to a dated sheet, creating the
/// sheet on first use each day. Values only; cell styling stays in the
/// spreadsheet itself.
pub struct SheetsReporter {
    spreadsheet_id: String,
    access_token: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for SheetsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsReporter")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    #[serde(default)]
    properties: SheetProperties,
}

#[derive(Debug, Default, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

impl SheetsReporter {
    pub fn new(config: &SheetsConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token: config.access_token.clone(),
            http,
        }
    }

    fn configured(&self) -> bool {
        !self.spreadsheet_id.is_empty() && !self.access_token.is_empty()
    }

    /// Create the dated sheet unless it already exists.
    async fn ensure_sheet(&self, title: &str) -> crate::Result<()> {
        let url = format!(
            "{}/{}?fields=sheets.properties.title",
            SHEETS_API_URL, self.spreadsheet_id
        );
        let response = self.http.get(&url, Some(&self.access_token)).await?;
        if !response.ok() {
            return Err(crate::WatchtowerError::Report(format!(
                "Sheets metadata returned status {}: {}",
                response.status, response.body
            )));
        }

        let meta: SpreadsheetMeta = serde_json::from_str(&response.body)?;
        if meta.sheets.iter().any(|s| s.properties.title == title) {
            return Ok(());
        }

        tracing::info!("Creating report sheet '{}'", title);
        let url = format!(
            "{}/{}:batchUpdate",
            SHEETS_API_URL, self.spreadsheet_id
        );
        let body = serde_json::json!({
            "requests": [{"addSheet": {"properties": {"title": title}}}]
        });
        let response = self
            .http
            .post_json(&url, Some(&self.access_token), &body)
            .await?;
        if !response.ok() {
            return Err(crate::WatchtowerError::Report(format!(
                "Sheet creation returned status {}: {}",
                response.status, response.body
            )));
        }
        Ok(())
    }

    async fn append(&self, title: &str, values: Vec<Vec<String>>) -> crate::Result<()> {
        let url = format!(
            "{}/{}/values/'{}'!A1:append?valueInputOption=RAW",
            SHEETS_API_URL, self.spreadsheet_id, title
        );
        let body = serde_json::json!({ "values": values });
        let response = self
            .http
            .post_json(&url, Some(&self.access_token), &body)
            .await?;
        if !response.ok() {
            return Err(crate::WatchtowerError::Report(format!(
                "Sheets append returned status {}: {}",
                response.status, response.body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportSink for SheetsReporter {
    async fn write_report(
        &self,
        rows: &[StatusRow],
        transitions: &[Transition],
        now: DateTime<Tz>,
    ) -> crate::Result<()> {
        if !self.configured() {
            tracing::warn!("Sheets reporting not configured, skipping spreadsheet write");
            return Ok(());
        }

        let title = now.format("%d.%m.%Y").to_string();
        self.ensure_sheet(&title).await?;
        self.append(&title, build_block(rows, transitions, now))
            .await?;

        tracing::info!(
            "Report for {} clients appended to sheet '{}'",
            rows.len(),
            title
        );
        Ok(())
    }
}

fn header_row() -> Vec<String> {
    let mut header = vec![
        "Client".to_string(),
        "Login".to_string(),
        "Password".to_string(),
    ];
    header.extend(Channel::ALL.iter().map(|c| c.display_name().to_string()));
    header.push("Comment".to_string());
    header.push("Changes since last run".to_string());
    header
}

/// Assemble the full value block: a timestamp line, one section per
/// client group with its own header and OK count, and the glyph legend.
pub fn build_block(
    rows: &[StatusRow],
    transitions: &[Transition],
    now: DateTime<Tz>,
) -> Vec<Vec<String>> {
    let mut changes: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for transition in transitions {
        changes
            .entry(transition.client.as_str())
            .or_default()
            .push(transition.describe());
    }

    let mut values = vec![vec![format!("📊 Report {}", now.format("%H:%M"))]];

    for (group, icon) in [(ClientGroup::Custom, "📦"), (ClientGroup::Platform, "🌐")] {
        let group_rows: Vec<&StatusRow> = rows.iter().filter(|r| r.group == group).collect();
        if group_rows.is_empty() {
            continue;
        }
        let ok_count = group_rows.iter().filter(|r| r.is_healthy()).count();

        values.push(vec![format!(
            "{} {} ({} clients, ✅ {})",
            icon,
            group.heading(),
            group_rows.len(),
            ok_count
        )]);
        values.push(header_row());

        for row in group_rows {
            let mut cells = vec![row.client.clone(), row.login.clone(), row.password.clone()];
            for channel in Channel::ALL {
                let glyph = row
                    .statuses
                    .get(&channel)
                    .map(|s| s.glyph())
                    .unwrap_or("—");
                cells.push(glyph.to_string());
            }
            cells.push(row.comment.clone());
            cells.push(
                changes
                    .get(row.client.as_str())
                    .map(|c| c.join("\n"))
                    .unwrap_or_default(),
            );
            values.push(cells);
        }
        values.push(Vec::new());
    }

    values.push(vec![
        "Legend:".to_string(),
        "✅ working".to_string(),
        "❌ broken / not responding".to_string(),
        "— no integration / not configured".to_string(),
    ]);

    values
}
