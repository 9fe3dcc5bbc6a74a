//! `GET /export` — download collected data as JSON or CSV.

use std::collections::BTreeSet;

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{ApiError, AppState};
use crate::models::RecordKind;
use crate::store::record::{CREATED_AT_FIELD, ID_FIELD};
use crate::store::{Filter, Page, Record};

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    data_type: String,
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "json".into()
}

/// What to export: one kind, or everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportTarget {
    One(RecordKind),
    All,
}

impl ExportTarget {
    fn parse(s: &str) -> Result<Self, ApiError> {
        if s == "all" {
            return Ok(ExportTarget::All);
        }
        s.parse().map(ExportTarget::One).map_err(|_| {
            ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("data_type must be one of vlogs, sentiments, gps, all; got {s:?}"),
            )
        })
    }

    fn name(&self) -> &'static str {
        match self {
            ExportTarget::One(kind) => kind.as_str(),
            ExportTarget::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    fn parse(s: &str) -> Result<Self, ApiError> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("format must be json or csv; got {other:?}"),
            )),
        }
    }
}

pub async fn export_data(
    State(state): State<AppState>,
    params: Result<Query<ExportParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let target = ExportTarget::parse(&params.data_type)?;
    let format = ExportFormat::parse(&params.format)?;

    if target == ExportTarget::All && format == ExportFormat::Csv {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "CSV format not supported for 'all' data type",
        ));
    }

    let kinds: Vec<RecordKind> = match target {
        ExportTarget::One(kind) => vec![kind],
        ExportTarget::All => RecordKind::ALL.to_vec(),
    };

    let mut exported = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let records = state
            .storage
            .get_collection(kind.collection())
            .await
            .query(&Filter::new(), Page::all())
            .await
            .map_err(|e| ApiError::storage("Error exporting data", e))?;
        exported.push((kind, records));
    }

    let total: usize = exported.iter().map(|(_, r)| r.len()).sum();
    info!(data_type = target.name(), format = ?format, records = total, "Export requested");

    match format {
        ExportFormat::Json => {
            let body = json_export(target, exported)?;
            Ok(attachment(
                "application/json",
                &format!("emogo_export_{}.json", target.name()),
                body,
            ))
        }
        ExportFormat::Csv => {
            let records = exported
                .into_iter()
                .next()
                .map(|(_, records)| records)
                .unwrap_or_default();
            if records.is_empty() {
                return Err(ApiError::new(
                    StatusCode::NOT_FOUND,
                    format!("No {} data found", target.name()),
                ));
            }
            Ok(attachment(
                "text/csv",
                &format!("emogo_export_{}.csv", target.name()),
                to_csv(&records),
            ))
        }
    }
}

fn attachment(content_type: &'static str, filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
        .into_response()
}

/// Pretty JSON document keyed by data type, stamped with the export time.
///
/// A full export uses collection names as keys; a single-kind export uses the
/// `data_type` name.
fn json_export(
    target: ExportTarget,
    exported: Vec<(RecordKind, Vec<Record>)>,
) -> Result<String, ApiError> {
    let mut doc = serde_json::Map::new();
    for (kind, records) in exported {
        let key = match target {
            ExportTarget::All => kind.collection(),
            ExportTarget::One(_) => kind.as_str(),
        };
        doc.insert(
            key.to_string(),
            Value::Array(records.into_iter().map(Value::Object).collect()),
        );
    }
    doc.insert(
        "export_timestamp".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );

    serde_json::to_string_pretty(&Value::Object(doc)).map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error exporting data: {e}"),
        )
    })
}

/// Render records as CSV. Columns are `id`, `created_at`, then every other
/// field name across all records in sorted order. Missing and null fields are
/// empty, nested values are JSON text.
pub fn to_csv(records: &[Record]) -> String {
    let fields: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .filter(|k| *k != ID_FIELD && *k != CREATED_AT_FIELD)
        .collect();
    let columns: Vec<&str> = [ID_FIELD, CREATED_AT_FIELD]
        .into_iter()
        .chain(fields)
        .collect();

    let mut out = String::new();
    push_row(&mut out, columns.iter().map(|c| c.to_string()));
    for record in records {
        push_row(
            &mut out,
            columns
                .iter()
                .map(|c| record.get(*c).map(csv_cell).unwrap_or_default()),
        );
    }
    out
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(&cell);
        }
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn csv_quotes_and_unions_columns() {
        let records = vec![
            record(json!({ "id": "1", "text": "hello, world" })),
            record(json!({ "id": "2", "text": "say \"hi\"", "mood": null, "emotions": { "joy": 1 } })),
        ];

        let csv = to_csv(&records);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "id,created_at,emotions,mood,text");
        assert_eq!(lines[1], "1,,,,\"hello, world\"");
        assert_eq!(lines[2], "2,,\"{\"\"joy\"\":1}\",,\"say \"\"hi\"\"\"");
    }

    #[test]
    fn target_parsing() {
        assert_eq!(ExportTarget::parse("all").unwrap(), ExportTarget::All);
        assert_eq!(
            ExportTarget::parse("gps").unwrap(),
            ExportTarget::One(RecordKind::Gps)
        );
        assert!(ExportTarget::parse("photos").is_err());
        assert!(ExportFormat::parse("xml").is_err());
    }

    #[test]
    fn json_export_keys() {
        let single = json_export(
            ExportTarget::One(RecordKind::Gps),
            vec![(RecordKind::Gps, vec![record(json!({ "id": "1" }))])],
        )
        .unwrap();
        let doc: Value = serde_json::from_str(&single).unwrap();
        assert_eq!(doc["gps"][0]["id"], "1");
        assert!(doc["export_timestamp"].is_string());

        let all = json_export(
            ExportTarget::All,
            RecordKind::ALL.iter().map(|k| (*k, Vec::new())).collect(),
        )
        .unwrap();
        let doc: Value = serde_json::from_str(&all).unwrap();
        assert!(doc["gps_coordinates"].as_array().unwrap().is_empty());
        assert!(doc["vlogs"].is_array());
        assert!(doc["sentiments"].is_array());
    }
}
