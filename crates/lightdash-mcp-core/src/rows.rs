//! Flattening query result rows.
//!
//! Lightdash returns every cell as `{ "value": { "raw": .., "formatted": .. } }`.
//! Agents get `{ "raw": .., "formatted": .. }` instead. Cells that don't match
//! the nested shape are passed through as-is rather than rejected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A result row as returned by the API.
pub type ResultRow = Map<String, Value>;

/// A flattened result row.
pub type FlatRow = Map<String, Value>;

/// Flattened cell. Either part may be absent upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatCell {
    /// Raw value as stored in the warehouse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    /// Display value with formatting applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<Value>,
}

impl FlatCell {
    /// Extract `{raw, formatted}` from a cell, or `None` when the cell is not
    /// an object with a `value` key.
    pub fn from_cell(cell: &Value) -> Option<Self> {
        let value = cell.as_object()?.get("value")?;
        Some(Self {
            raw: value.get("raw").cloned(),
            formatted: value.get("formatted").cloned(),
        })
    }

    fn into_value(self) -> Value {
        let mut out = Map::new();
        if let Some(raw) = self.raw {
            out.insert("raw".to_string(), raw);
        }
        if let Some(formatted) = self.formatted {
            out.insert("formatted".to_string(), formatted);
        }
        Value::Object(out)
    }
}

/// Flatten one row.
pub fn flatten_row(row: &ResultRow) -> FlatRow {
    row.iter()
        .map(|(field_id, cell)| {
            let flat = FlatCell::from_cell(cell).map_or_else(|| cell.clone(), FlatCell::into_value);
            (field_id.clone(), flat)
        })
        .collect()
}

/// Flatten every row, preserving row order. Absent input yields no rows.
pub fn flatten_result_rows(rows: Option<&[ResultRow]>) -> Vec<FlatRow> {
    rows.unwrap_or_default().iter().map(flatten_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> ResultRow {
        value.as_object().cloned().expect("row must be an object")
    }

    #[test]
    fn absent_rows_give_empty_output() {
        assert!(flatten_result_rows(None).is_empty());
        assert!(flatten_result_rows(Some(&[])).is_empty());
    }

    #[test]
    fn flattens_orders_count() {
        let rows = vec![row(json!({
            "orders_count": {"value": {"raw": 42, "formatted": "42"}}
        }))];
        let flat = flatten_result_rows(Some(&rows));
        assert_eq!(
            Value::Object(flat[0].clone()),
            json!({"orders_count": {"raw": 42, "formatted": "42"}})
        );
    }

    #[test]
    fn cell_without_value_passes_through() {
        let rows = vec![row(json!({
            "orders_status": {"raw": "done"},
            "orders_count": 3,
            "orders_note": null
        }))];
        let flat = flatten_result_rows(Some(&rows));
        assert_eq!(flat[0]["orders_status"], json!({"raw": "done"}));
        assert_eq!(flat[0]["orders_count"], json!(3));
        assert_eq!(flat[0]["orders_note"], Value::Null);
    }

    #[test]
    fn missing_raw_or_formatted_is_tolerated() {
        let rows = vec![row(json!({
            "a": {"value": {"raw": 1}},
            "b": {"value": {"formatted": "x"}},
            "c": {"value": {}},
            "d": {"value": null},
            "e": {"value": 7}
        }))];
        let flat = &flatten_result_rows(Some(&rows))[0];
        assert_eq!(flat["a"], json!({"raw": 1}));
        assert_eq!(flat["b"], json!({"formatted": "x"}));
        assert_eq!(flat["c"], json!({}));
        assert_eq!(flat["d"], json!({}));
        assert_eq!(flat["e"], json!({}));
    }

    #[test]
    fn null_raw_is_kept() {
        let rows = vec![row(json!({"a": {"value": {"raw": null, "formatted": "∅"}}}))];
        let flat = &flatten_result_rows(Some(&rows))[0];
        assert_eq!(flat["a"], json!({"raw": null, "formatted": "∅"}));
    }

    #[test]
    fn row_order_is_preserved() {
        let rows: Vec<ResultRow> = (0..5)
            .map(|i| row(json!({"n": {"value": {"raw": i, "formatted": i.to_string()}}})))
            .collect();
        let flat = flatten_result_rows(Some(&rows));
        let raws: Vec<_> = flat.iter().map(|r| r["n"]["raw"].clone()).collect();
        assert_eq!(raws, vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
    }
}
