//! Turns a computed `KpiRecord` into a downloadable document.
//!
//! Renderers only format values; every figure comes straight from the
//! record. All formats list the same fields in the same order, each with
//! its unit and two decimals.

mod csv_export;
mod markdown;
mod pdf;

use microgrid_client::{domain::KpiField, KpiRecord};
use time::{macros::format_description, Date, OffsetDateTime};

use super::ReportFormat;

pub const NO_DATA_MESSAGE: &str = "No data for the selected period.";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("report output failed: {0}")]
    Io(String),
    #[error("report encoding failed: {0}")]
    Encoding(String),
}

impl RenderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RenderError::Io(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportMetadata {
    pub name: String,
    pub start: Date,
    pub end: Date,
    pub format: ReportFormat,
    pub generated_at: OffsetDateTime,
}

impl ReportMetadata {
    pub fn period(&self) -> String {
        format!("{} to {}", self.start, self.end)
    }

    pub fn generated(&self) -> String {
        self.generated_at
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .unwrap_or_else(|_| self.generated_at.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub format: ReportFormat,
    pub bytes: Vec<u8>,
}

impl RenderedReport {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Render `record` in the format named by `meta`. `None` produces a document
/// that states the period had no data instead of a KPI table.
pub fn render(record: Option<&KpiRecord>, meta: &ReportMetadata) -> Result<RenderedReport, RenderError> {
    let rows = record.map(KpiRecord::fields);
    let rows = rows.as_ref().map(|r| r.as_slice());

    let bytes = match meta.format {
        ReportFormat::Markdown => markdown::render(rows, meta).into_bytes(),
        ReportFormat::Csv => csv_export::render(rows, meta)?,
        ReportFormat::Pdf => pdf::render(rows, meta)?,
    };

    metrics::counter!("report_render_bytes_total", "format" => meta.format.extension())
        .increment(bytes.len() as u64);

    Ok(RenderedReport {
        format: meta.format,
        bytes,
    })
}

fn format_value(field: &KpiField) -> String {
    format!("{:.2}", field.value)
}
