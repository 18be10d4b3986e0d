//! Known raw payload shapes.
//!
//! Each exchange response falls into one of a few layouts. Classification
//! happens once, up front; conversion to rows is then per variant.

use crate::domain::{is_blank_payload, Market};
use serde_json::{Map, Value};
use thiserror::Error;

/// A payload the normalizer cannot turn into rows. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaMismatch {
    #[error("{market} does not publish {found} payloads")]
    UnexpectedShape { market: Market, found: &'static str },

    #[error("no table titled with {keyword:?}")]
    MissingTable { keyword: String },

    #[error("unrecognized payload with keys [{0}]")]
    Unrecognized(String),
}

/// Top-level layout of a payload, without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `null`, `{}`, `[]`, or a bare status message.
    Empty,
    /// `{"tables": [{"title", "fields", "data"}, ...]}`
    TitledTables,
    /// `[{...}, ...]`
    RowList,
    /// `{"data": [...], "fields"?: [...]}`
    DataEnvelope,
    Unrecognized,
}

impl PayloadShape {
    pub fn of(payload: &Value) -> Self {
        if is_blank_payload(payload) {
            return PayloadShape::Empty;
        }
        match payload {
            Value::Array(_) => PayloadShape::RowList,
            Value::Object(map) => {
                if map.get("tables").is_some_and(Value::is_array) {
                    PayloadShape::TitledTables
                } else if map.get("data").is_some_and(Value::is_array) {
                    PayloadShape::DataEnvelope
                } else if is_status_only(map) {
                    PayloadShape::Empty
                } else {
                    PayloadShape::Unrecognized
                }
            }
            _ => PayloadShape::Unrecognized,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PayloadShape::Empty => "empty",
            PayloadShape::TitledTables => "titled_tables",
            PayloadShape::RowList => "row_list",
            PayloadShape::DataEnvelope => "data_envelope",
            PayloadShape::Unrecognized => "unrecognized",
        }
    }

    /// Whether `market`'s exchange answers in this layout.
    pub fn is_published_by(self, market: Market) -> bool {
        match (self, market) {
            (PayloadShape::Empty, _) => true,
            (PayloadShape::TitledTables, Market::Taiex) => true,
            (PayloadShape::RowList | PayloadShape::DataEnvelope, Market::Otc) => true,
            _ => false,
        }
    }
}

/// No-data answers carry only status metadata, e.g. `{"stat": "..."}`.
fn is_status_only(map: &Map<String, Value>) -> bool {
    map.contains_key("stat") && map.values().all(|v| !v.is_array() && !v.is_object())
}

/// One titled table from a report.
#[derive(Debug, Clone, PartialEq)]
pub struct TitledTable {
    pub title: String,
    pub fields: Vec<String>,
    pub data: Vec<Value>,
}

/// A classified payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    TitledTables(Vec<TitledTable>),
    RowList(Vec<Value>),
    DataEnvelope { fields: Vec<String>, data: Vec<Value> },
    Empty,
}

/// A source row keyed by its column names.
pub type RawRow = Map<String, Value>;

impl RawPayload {
    pub fn classify(payload: &Value) -> Result<Self, SchemaMismatch> {
        match PayloadShape::of(payload) {
            PayloadShape::Empty => Ok(RawPayload::Empty),
            PayloadShape::RowList => Ok(RawPayload::RowList(
                payload.as_array().cloned().unwrap_or_default(),
            )),
            PayloadShape::DataEnvelope => Ok(RawPayload::DataEnvelope {
                fields: string_list(payload.get("fields")),
                data: array(payload.get("data")),
            }),
            PayloadShape::TitledTables => Ok(RawPayload::TitledTables(
                array(payload.get("tables"))
                    .iter()
                    .filter_map(titled_table)
                    .collect(),
            )),
            PayloadShape::Unrecognized => Err(SchemaMismatch::Unrecognized(describe(payload))),
        }
    }

    pub fn shape(&self) -> PayloadShape {
        match self {
            RawPayload::TitledTables(_) => PayloadShape::TitledTables,
            RawPayload::RowList(_) => PayloadShape::RowList,
            RawPayload::DataEnvelope { .. } => PayloadShape::DataEnvelope,
            RawPayload::Empty => PayloadShape::Empty,
        }
    }

    /// Keyed rows for `market`. Titled tables yield the rows of the first
    /// table whose title contains `keyword`.
    pub fn rows(&self, market: Market, keyword: &str) -> Result<Vec<RawRow>, SchemaMismatch> {
        let shape = self.shape();
        if !shape.is_published_by(market) {
            return Err(SchemaMismatch::UnexpectedShape {
                market,
                found: shape.name(),
            });
        }

        match self {
            RawPayload::Empty => Ok(Vec::new()),
            RawPayload::RowList(rows) => Ok(keyed_rows(&[], rows)),
            RawPayload::DataEnvelope { fields, data } => Ok(keyed_rows(fields, data)),
            RawPayload::TitledTables(tables) => tables
                .iter()
                .find(|t| t.title.contains(keyword))
                .map(|t| keyed_rows(&t.fields, &t.data))
                .ok_or_else(|| SchemaMismatch::MissingTable {
                    keyword: keyword.to_string(),
                }),
        }
    }
}

fn array(value: Option<&Value>) -> Vec<Value> {
    value.and_then(Value::as_array).cloned().unwrap_or_default()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    array(value)
        .iter()
        .map(|v| match v {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .collect()
}

fn titled_table(table: &Value) -> Option<TitledTable> {
    let title = table.get("title")?.as_str()?.to_string();
    Some(TitledTable {
        title,
        fields: string_list(table.get("fields")),
        data: array(table.get("data")),
    })
}

/// Object rows pass through; array rows are zipped with `fields`. Anything
/// else is dropped.
fn keyed_rows(fields: &[String], rows: &[Value]) -> Vec<RawRow> {
    rows.iter()
        .filter_map(|row| match row {
            Value::Object(map) => Some(map.clone()),
            Value::Array(cells) if !fields.is_empty() => Some(
                fields
                    .iter()
                    .cloned()
                    .zip(cells.iter().cloned())
                    .collect(),
            ),
            _ => None,
        })
        .collect()
}

fn describe(payload: &Value) -> String {
    match payload {
        Value::Object(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        other => format!("<{}>", kind(other)),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shapes() {
        assert_eq!(PayloadShape::of(&json!({})), PayloadShape::Empty);
        assert_eq!(PayloadShape::of(&json!(null)), PayloadShape::Empty);
        assert_eq!(
            PayloadShape::of(&json!({"stat": "很抱歉，沒有符合條件的資料!"})),
            PayloadShape::Empty
        );
        assert_eq!(PayloadShape::of(&json!([{"a": 1}])), PayloadShape::RowList);
        assert_eq!(PayloadShape::of(&json!({"data": []})), PayloadShape::DataEnvelope);
        assert_eq!(
            PayloadShape::of(&json!({"stat": "OK", "tables": []})),
            PayloadShape::TitledTables
        );
        assert_eq!(PayloadShape::of(&json!({"error": "x"})), PayloadShape::Unrecognized);
        assert_eq!(PayloadShape::of(&json!("text")), PayloadShape::Unrecognized);
    }

    #[test]
    fn titled_table_rows_are_keyed_by_fields() {
        let payload = json!({"tables": [
            {"title": "價格指數", "fields": ["指數", "收盤指數"], "data": [["x", "1"]]},
            {"title": "發行量加權股價指數", "fields": ["日期", "收盤指數"], "data": [["112/09/28", "16,550.32"], "junk"]},
        ]});
        let rows = RawPayload::classify(&payload)
            .unwrap()
            .rows(Market::Taiex, "發行量加權")
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["收盤指數"], json!("16,550.32"));
    }

    #[test]
    fn missing_keyword_table_is_mismatch() {
        let payload = json!({"tables": [{"title": "報酬指數", "fields": [], "data": []}]});
        let err = RawPayload::classify(&payload)
            .unwrap()
            .rows(Market::Taiex, "發行量加權")
            .unwrap_err();
        assert!(matches!(err, SchemaMismatch::MissingTable { .. }));
    }

    #[test]
    fn market_must_publish_shape() {
        let raw = RawPayload::classify(&json!([{"Close": "1"}])).unwrap();
        assert_eq!(
            raw.rows(Market::Taiex, "發行量加權").unwrap_err(),
            SchemaMismatch::UnexpectedShape {
                market: Market::Taiex,
                found: "row_list"
            }
        );
        assert_eq!(raw.rows(Market::Otc, "發行量加權").unwrap().len(), 1);
    }

    #[test]
    fn envelope_accepts_objects_or_matrix() {
        let objects = RawPayload::classify(&json!({"data": [{"Close": "1"}]})).unwrap();
        assert_eq!(objects.rows(Market::Otc, "").unwrap().len(), 1);

        let matrix =
            RawPayload::classify(&json!({"fields": ["Date", "Close"], "data": [["1120928", "2"]]}))
                .unwrap();
        let rows = matrix.rows(Market::Otc, "").unwrap();
        assert_eq!(rows[0]["Date"], json!("1120928"));
    }

    #[test]
    fn unrecognized_names_its_keys() {
        let err = RawPayload::classify(&json!({"error": 1})).unwrap_err();
        assert_eq!(err, SchemaMismatch::Unrecognized("error".into()));
    }
}
