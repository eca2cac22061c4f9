//! Query result types for bq-insight.
//!
//! `QueryResult` is what a warehouse client hands back (schema plus typed
//! rows); `ResultSet` is the record-oriented form the pipeline consumes.

/// Represents the result of executing a SQL query.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data, each aligned with `columns`.
    pub rows: Vec<Row>,

    /// Number of rows in the result.
    pub row_count: usize,

    /// Warehouse job that produced the result, if any.
    pub job_id: Option<String>,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            job_id: None,
        }
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Converts typed rows into records keyed by column name.
    ///
    /// Cells beyond the schema are dropped and missing cells become null, so
    /// every record carries exactly the schema's columns in schema order.
    pub fn into_result_set(self) -> ResultSet {
        let columns: Vec<String> = self.columns.into_iter().map(|c| c.name).collect();

        let records = self
            .rows
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                columns
                    .iter()
                    .map(|name| {
                        let value = cells.next().unwrap_or(Value::Null);
                        (name.clone(), value.into_json())
                    })
                    .collect::<Record>()
            })
            .collect();

        ResultSet { columns, records }
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the warehouse (e.g. "INT64").
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// Represents a single value from a warehouse query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text value; also dates, timestamps and other textual types.
    String(String),

    /// Nested data (repeated or struct columns).
    Json(serde_json::Value),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to its JSON representation.
    ///
    /// Non-finite floats have no JSON form and become strings.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
            Value::String(s) => serde_json::Value::String(s),
            Value::Json(v) => v,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// One row keyed by column name, in schema order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Ordered records produced by one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl ResultSet {
    /// Column names in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serializes the records as a JSON array for inclusion in a prompt.
    pub fn to_json_records(&self) -> String {
        serde_json::to_string_pretty(&self.records).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_result() -> QueryResult {
        QueryResult::with_data(
            vec![
                ColumnInfo::new("region", "STRING"),
                ColumnInfo::new("orders", "INT64"),
                ColumnInfo::new("revenue", "FLOAT64"),
            ],
            vec![
                vec!["EMEA".into(), Value::Int(12), Value::Float(310.5)],
                vec!["APAC".into(), Value::Null, Value::Float(99.0)],
            ],
        )
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(2.71f64), Value::Float(2.71));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Int(7));
    }

    #[test]
    fn test_non_finite_float_becomes_string() {
        assert_eq!(Value::Float(f64::NAN).into_json(), json!("NaN"));
        assert_eq!(Value::Float(f64::INFINITY).into_json(), json!("inf"));
    }

    #[test]
    fn test_query_result_with_data() {
        let result = sample_result();
        assert!(!result.is_empty());
        assert_eq!(result.row_count, 2);
        assert_eq!(result.columns.len(), 3);
    }

    #[test]
    fn test_into_result_set_preserves_columns_and_types() {
        let set = sample_result().into_result_set();

        assert_eq!(set.columns(), &["region", "orders", "revenue"]);
        assert_eq!(set.len(), 2);
        assert_eq!(
            serde_json::Value::Object(set.records()[0].clone()),
            json!({"region": "EMEA", "orders": 12, "revenue": 310.5})
        );
        assert_eq!(set.records()[1]["orders"], serde_json::Value::Null);
    }

    #[test]
    fn test_into_result_set_records_share_column_set() {
        let result = QueryResult::with_data(
            vec![ColumnInfo::new("a", "INT64"), ColumnInfo::new("b", "INT64")],
            vec![
                vec![Value::Int(1)],
                vec![Value::Int(1), Value::Int(2), Value::Int(3)],
                vec![Value::Int(4), Value::Int(5)],
            ],
        );

        let set = result.into_result_set();
        for record in set.records() {
            let keys: Vec<&String> = record.keys().collect();
            assert_eq!(keys, vec!["a", "b"]);
        }
    }

    #[test]
    fn test_empty_result_set_json() {
        let set = QueryResult::new().into_result_set();
        assert!(set.is_empty());
        assert_eq!(set.to_json_records(), "[]");
    }

    #[test]
    fn test_record_key_order_follows_schema() {
        let result = QueryResult::with_data(
            vec![ColumnInfo::new("z", "STRING"), ColumnInfo::new("a", "STRING")],
            vec![vec!["last".into(), "first".into()]],
        );
        let json = result.into_result_set().to_json_records();
        assert!(json.find("\"z\"").unwrap() < json.find("\"a\"").unwrap());
    }
}
