//! Parsing of files attached to record requests.
//!
//! Tabular uploads become an array of objects keyed by the header row. Empty
//! cells are left out of their row's object and blank rows are skipped.

use calamine::{Data, Reader, Xlsx};
use sea_orm::JsonValue;
use serde_json::{Map, Number};
use std::io::Cursor;
use thiserror::Error;

pub const JSON_MIME: &str = "application/json";
pub const CSV_MIME: &str = "text/csv";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("MIME type is required")]
    MissingType,

    #[error("Unsupported file type.")]
    Unsupported(String),

    #[error("Invalid JSON file: {0}")]
    Json(String),

    #[error("Invalid CSV file: {0}")]
    Csv(String),

    #[error("Invalid spreadsheet: {0}")]
    Spreadsheet(String),
}

/// Parses an uploaded file according to its declared content type.
pub fn parse_upload(bytes: &[u8], content_type: Option<&str>) -> Result<JsonValue, UploadError> {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
        .ok_or(UploadError::MissingType)?;

    match mime.as_str() {
        JSON_MIME => serde_json::from_slice(bytes).map_err(|e| UploadError::Json(e.to_string())),
        CSV_MIME => parse_csv(bytes),
        XLSX_MIME => parse_xlsx(bytes),
        _ => Err(UploadError::Unsupported(mime)),
    }
}

fn column_name(header: &str, index: usize) -> String {
    let header = header.trim();
    if header.is_empty() {
        format!("column_{}", index + 1)
    } else {
        header.to_string()
    }
}

fn infer_scalar(text: &str) -> Option<JsonValue> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(JsonValue::from(int));
    }
    if let Some(number) = text.parse::<f64>().ok().and_then(Number::from_f64) {
        return Some(JsonValue::Number(number));
    }
    Some(JsonValue::String(text.to_string()))
}

fn parse_csv(bytes: &[u8]) -> Result<JsonValue, UploadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| UploadError::Csv(e.to_string()))?
        .iter()
        .enumerate()
        .map(|(i, h)| column_name(h, i))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| UploadError::Csv(e.to_string()))?;
        let object: Map<String, JsonValue> = headers
            .iter()
            .zip(record.iter())
            .filter_map(|(key, raw)| infer_scalar(raw).map(|value| (key.clone(), value)))
            .collect();
        if !object.is_empty() {
            rows.push(JsonValue::Object(object));
        }
    }

    Ok(JsonValue::Array(rows))
}

fn cell_value(cell: &Data) -> Option<JsonValue> {
    match cell {
        Data::Empty => None,
        Data::String(s) => infer_text(s),
        Data::Int(i) => Some(JsonValue::from(*i)),
        Data::Float(f) => Number::from_f64(*f).map(JsonValue::Number),
        Data::Bool(b) => Some(JsonValue::Bool(*b)),
        Data::DateTime(_) | Data::DateTimeIso(_) | Data::DurationIso(_) => {
            Some(JsonValue::String(cell.to_string()))
        }
        Data::Error(_) => Some(JsonValue::Null),
    }
}

fn infer_text(text: &str) -> Option<JsonValue> {
    if text.trim().is_empty() {
        None
    } else {
        Some(JsonValue::String(text.to_string()))
    }
}

fn parse_xlsx(bytes: &[u8]) -> Result<JsonValue, UploadError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| UploadError::Spreadsheet(e.to_string()))?;

    let Some(sheet) = workbook.sheet_names().into_iter().next() else {
        return Ok(JsonValue::Array(Vec::new()));
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| UploadError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(JsonValue::Array(Vec::new()));
    };
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| column_name(&cell.to_string(), i))
        .collect();

    let content = rows
        .filter_map(|row| {
            let object: Map<String, JsonValue> = headers
                .iter()
                .zip(row.iter())
                .filter_map(|(key, cell)| cell_value(cell).map(|value| (key.clone(), value)))
                .collect();
            (!object.is_empty()).then_some(JsonValue::Object(object))
        })
        .collect();

    Ok(JsonValue::Array(content))
}
