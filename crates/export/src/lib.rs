pub mod docx;
pub mod json;
pub mod markdown;
pub mod pdf;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use report::Report;
use thiserror::Error;

pub use markdown::{Block, parse_blocks};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Word export failed: {0}")]
    Docx(String),
    #[error("PDF export failed: {0}")]
    Pdf(String),
    #[error("unknown export format: {0}")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Docx,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Json, ExportFormat::Docx, ExportFormat::Pdf];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Docx => "Word",
            ExportFormat::Pdf => "PDF",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "docx" | "word" => Ok(ExportFormat::Docx),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Serialize `report` into `format`. Each format fails independently of the others.
pub fn export(report: &Report, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let bytes = match format {
        ExportFormat::Json => json::to_json(report)?,
        ExportFormat::Docx => docx::to_docx(report)?,
        ExportFormat::Pdf => pdf::to_pdf(report)?,
    };
    tracing::info!(
        company = %report.company_name,
        format = %format,
        bytes = bytes.len(),
        "Report exported"
    );
    Ok(bytes)
}

/// `<company>_report_<YYYYmmdd_HHMM>.<ext>`, restricted to ASCII so it fits a header.
pub fn export_filename(company_name: &str, at: DateTime<Utc>, format: ExportFormat) -> String {
    let mut company = String::new();
    for c in company_name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            company.push(c);
        } else if !company.ends_with('_') {
            company.push('_');
        }
    }
    let company = company.trim_matches('_');
    let company = if company.is_empty() { "company" } else { company };

    format!(
        "{}_report_{}.{}",
        company,
        at.format("%Y%m%d_%H%M"),
        format.extension()
    )
}
