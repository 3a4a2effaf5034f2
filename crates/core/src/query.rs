use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LocolError, Result};

/// All resources sharing one `(key, value)` resource attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceAttributeGroup {
    pub key: String,
    pub value: String,
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Timestamp,
    Double,
    Int32,
    Int64,
    Boolean,
    String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ColumnValues {
    Timestamp(Vec<Option<DateTime<Utc>>>),
    Double(Vec<Option<f64>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Boolean(Vec<Option<bool>>),
    String(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn empty(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Timestamp => Self::Timestamp(Vec::new()),
            ColumnType::Double => Self::Double(Vec::new()),
            ColumnType::Int32 => Self::Int32(Vec::new()),
            ColumnType::Int64 => Self::Int64(Vec::new()),
            ColumnType::Boolean => Self::Boolean(Vec::new()),
            ColumnType::String => Self::String(Vec::new()),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Timestamp(_) => ColumnType::Timestamp,
            Self::Double(_) => ColumnType::Double,
            Self::Int32(_) => ColumnType::Int32,
            Self::Int64(_) => ColumnType::Int64,
            Self::Boolean(_) => ColumnType::Boolean,
            Self::String(_) => ColumnType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Timestamp(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Boolean(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell(&self, row: usize) -> Option<Cell> {
        let cell = match self {
            Self::Timestamp(v) => v.get(row)?.map(Cell::Timestamp),
            Self::Double(v) => v.get(row)?.map(Cell::Double),
            Self::Int32(v) => v.get(row)?.map(Cell::Int32),
            Self::Int64(v) => v.get(row)?.map(Cell::Int64),
            Self::Boolean(v) => v.get(row)?.map(Cell::Boolean),
            Self::String(v) => v.get(row)?.clone().map(Cell::String),
        };
        Some(cell.unwrap_or(Cell::Null))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn column_type(&self) -> ColumnType {
        self.values.column_type()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Cell {
    Null,
    Timestamp(DateTime<Utc>),
    Double(f64),
    Int32(i32),
    Int64(i64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Timestamp(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Cell::Double(v) => write!(f, "{v}"),
            Cell::Int32(v) => write!(f, "{v}"),
            Cell::Int64(v) => write!(f, "{v}"),
            Cell::Boolean(v) => write!(f, "{v}"),
            Cell::String(v) => f.write_str(v),
        }
    }
}

/// Query result as named, typed columns of identical length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<Column>", into = "Vec<Column>")]
pub struct ColumnarResult {
    columns: Vec<Column>,
    row_count: usize,
}

impl ColumnarResult {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(ragged) = columns.iter().find(|c| c.values.len() != row_count) {
            return Err(LocolError::Internal(format!(
                "column {} has {} values, expected {row_count}",
                ragged.name,
                ragged.values.len()
            )));
        }
        Ok(Self { columns, row_count })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn row(&self, index: usize) -> Option<Vec<Cell>> {
        if index >= self.row_count {
            return None;
        }
        self.columns.iter().map(|c| c.values.cell(index)).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Cell>> + '_ {
        (0..self.row_count).filter_map(|i| self.row(i))
    }
}

impl TryFrom<Vec<Column>> for ColumnarResult {
    type Error = LocolError;

    fn try_from(columns: Vec<Column>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<ColumnarResult> for Vec<Column> {
    fn from(result: ColumnarResult) -> Self {
        result.columns
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub connected: bool,
    pub resources_count: usize,
    pub attributes_count: usize,
    pub scopes_count: usize,
    pub spans_count: usize,
    pub metrics_count: usize,
    pub logs_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ColumnarResult {
        ColumnarResult::new(vec![
            Column {
                name: "name".into(),
                values: ColumnValues::String(vec![Some("a".into()), None]),
            },
            Column {
                name: "value".into(),
                values: ColumnValues::Double(vec![Some(1.5), Some(2.0)]),
            },
        ])
        .unwrap()
    }

    #[test]
    fn rows_rebuild_from_columns() {
        let result = sample();
        assert_eq!(result.row_count(), 2);
        let rows = result.rows().collect::<Vec<_>>();
        assert_eq!(rows[0], vec![Cell::String("a".into()), Cell::Double(1.5)]);
        assert_eq!(rows[1], vec![Cell::Null, Cell::Double(2.0)]);
        assert!(result.row(2).is_none());
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = ColumnarResult::new(vec![
            Column {
                name: "a".into(),
                values: ColumnValues::Int32(vec![Some(1)]),
            },
            Column {
                name: "b".into(),
                values: ColumnValues::Int32(vec![]),
            },
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn json_shape_is_a_column_list() {
        let result = sample();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json[0]["name"], "name");
        assert_eq!(json[1]["values"]["type"], "double");
        let back: ColumnarResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);

        let ragged = serde_json::json!([
            {"name": "a", "values": {"type": "int32", "values": [1]}},
            {"name": "b", "values": {"type": "int32", "values": []}}
        ]);
        assert!(serde_json::from_value::<ColumnarResult>(ragged).is_err());
    }

    #[test]
    fn cell_display() {
        assert_eq!(Cell::Null.to_string(), "NULL");
        assert_eq!(Cell::Int64(7).to_string(), "7");
        assert_eq!(Cell::String("x".into()).to_string(), "x");
    }
}
