use report::Report;

use crate::ExportError;

/// Pretty-printed JSON. Non-ASCII text is written as-is.
pub fn to_json(report: &Report) -> Result<Vec<u8>, ExportError> {
    Ok(serde_json::to_vec_pretty(report)?)
}

pub fn from_json(bytes: &[u8]) -> Result<Report, ExportError> {
    Ok(serde_json::from_slice(bytes)?)
}
