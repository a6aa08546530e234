//! CSV, plain text and JSON encodings of an extracted record.

use crate::error::{Result, StatementError};
use crate::models::record::ExtractedRecord;

/// Text written for a not-found field in the plain text export.
pub const TEXT_NOT_FOUND: &str = "not found";

/// JSON object keyed by field identifier; not found is `null`.
pub fn to_json(record: &ExtractedRecord) -> Result<serde_json::Value> {
    serde_json::to_value(record).map_err(|e| StatementError::Export(e.to_string()))
}

pub fn to_json_string(record: &ExtractedRecord, pretty: bool) -> Result<String> {
    let encoded = if pretty {
        serde_json::to_string_pretty(record)
    } else {
        serde_json::to_string(record)
    };
    encoded.map_err(|e| StatementError::Export(e.to_string()))
}

/// A header row of field identifiers and one data row; not found is an empty cell.
pub fn to_csv(record: &ExtractedRecord) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(record.fields().map(|f| f.as_str()))
        .map_err(|e| StatementError::Export(e.to_string()))?;
    writer
        .write_record(
            record
                .fields()
                .map(|f| record.rendered(f).flatten().unwrap_or_default()),
        )
        .map_err(|e| StatementError::Export(e.to_string()))?;

    let bytes = writer
        .into_inner()
        .map_err(|e| StatementError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StatementError::Export(e.to_string()))
}

/// One `field: value` line per requested field.
pub fn to_text(record: &ExtractedRecord) -> String {
    record
        .fields()
        .map(|f| {
            let value = record
                .rendered(f)
                .flatten()
                .unwrap_or_else(|| TEXT_NOT_FOUND.to_string());
            format!("{}: {}\n", f.as_str(), value)
        })
        .collect()
}
