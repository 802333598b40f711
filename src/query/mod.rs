//! Query response decoding.
//!
//! The server answers a query with `{"results": [...]}`: one entry per
//! statement, each carrying zero or more series. A statement that matched
//! no data simply has no `series` key. Decoding walks that tree into typed
//! [`QueryResult`] values; row iteration is lazy and single-pass.

pub mod chunk;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{model::Value, CodecResult};

#[derive(Debug, Deserialize)]
struct RawResponse {
    results: Vec<RawStatement>,
}

#[derive(Debug, Deserialize)]
struct RawStatement {
    statement_id: Option<usize>,
    series: Option<Vec<RawSeries>>,
}

/// `columns` and `values` are mandatory once a series is present; every
/// unknown key is ignored.
#[derive(Debug, Deserialize)]
struct RawSeries {
    name: Option<String>,
    columns: Vec<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    values: Vec<Vec<serde_json::Value>>,
}

/// One named, tag-qualified result set within a statement.
#[derive(Debug, Clone, Default)]
pub struct Series {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub values: Vec<Vec<Value>>,
}

impl Series {
    /// Label used to key this series among its statement's siblings:
    /// `name[,tag=value...]` with tags in sorted order.
    pub fn label(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(1 + self.tags.len());
        if let Some(name) = &self.name {
            parts.push(name.clone());
        }
        for (k, v) in &self.tags {
            parts.push(format!("{}={}", k, v));
        }
        parts.join(",")
    }

    /// Position of a named column, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Result of one statement. `series` is empty when the statement matched
/// no data; that is a valid outcome, not an error.
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    pub statement_id: usize,
    pub series: Vec<Series>,
}

/// A fully decoded query response.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub statements: Vec<StatementResult>,
}

impl QueryResult {
    /// Total number of rows across all statements and series.
    pub fn row_count(&self) -> usize {
        self.statements.iter().flat_map(|s| s.series.iter()).map(|s| s.values.len()).sum()
    }

    /// Total number of series across all statements.
    pub fn series_count(&self) -> usize {
        self.statements.iter().map(|s| s.series.len()).sum()
    }

    /// Lazy, single-pass iteration over every row in response order.
    /// Restart only by iterating again from the decoded result.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            result: self,
            statement: 0,
            series: 0,
            row: 0,
        }
    }

    /// Iterate rows through a row-shaping function. Without shaping needs,
    /// use [`rows`](Self::rows) and take the plain positional values.
    pub fn rows_with<'a, T, F>(&'a self, mut f: F) -> impl Iterator<Item = T> + 'a
    where
        F: FnMut(&[Value], &RowMeta<'_>) -> T + 'a,
    {
        self.rows().map(move |(values, meta)| f(values, &meta))
    }
}

/// Metadata accompanying each yielded row.
#[derive(Debug, Clone)]
pub struct RowMeta<'a> {
    pub columns: &'a [String],
    pub name: Option<&'a str>,
    pub tags: &'a BTreeMap<String, String>,
    pub statement_id: usize,
}

/// Iterator over `(row values, metadata)` pairs.
pub struct Rows<'a> {
    result: &'a QueryResult,
    statement: usize,
    series: usize,
    row: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = (&'a [Value], RowMeta<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let statement = self.result.statements.get(self.statement)?;

            let Some(series) = statement.series.get(self.series) else {
                self.statement += 1;
                self.series = 0;
                self.row = 0;
                continue;
            };

            let Some(values) = series.values.get(self.row) else {
                self.series += 1;
                self.row = 0;
                continue;
            };

            self.row += 1;

            return Some((
                values.as_slice(),
                RowMeta {
                    columns: &series.columns,
                    name: series.name.as_deref(),
                    tags: &series.tags,
                    statement_id: statement.statement_id,
                },
            ));
        }
    }
}

fn convert(raw: RawResponse) -> QueryResult {
    let statements = raw
        .results
        .into_iter()
        .enumerate()
        .map(|(position, statement)| StatementResult {
            // servers normally echo a statement id; fall back to position
            statement_id: statement.statement_id.unwrap_or(position),
            series: statement
                .series
                .unwrap_or_default()
                .into_iter()
                .map(|s| Series {
                    name: s.name,
                    columns: s.columns,
                    tags: s.tags,
                    values: s.values.iter().map(|row| row.iter().map(Value::from).collect()).collect(),
                })
                .collect(),
        })
        .collect();

    QueryResult { statements }
}

/// Decode a complete response body.
pub fn decode_slice(body: &[u8]) -> CodecResult<QueryResult> {
    let raw: RawResponse = serde_json::from_slice(body)?;
    Ok(convert(raw))
}

/// Decode an already-parsed JSON tree.
pub fn decode_value(tree: serde_json::Value) -> CodecResult<QueryResult> {
    let raw: RawResponse = serde_json::from_value(tree)?;
    Ok(convert(raw))
}

#[cfg(test)]
mod test_query {
    use super::*;
    use crate::test_util::setup;

    const BODY: &str = r#"{
        "results": [
            {
                "statement_id": 0,
                "series": [
                    {
                        "name": "cpu_load_short",
                        "columns": ["time", "value", "host"],
                        "values": [
                            [1257894000000000000, 0.64, "server01"],
                            [1257894001000000000, 0.65, "server02"]
                        ]
                    }
                ]
            },
            {
                "statement_id": 1
            }
        ]
    }"#;

    #[test]
    fn test_decode_body() {
        setup();

        let result = decode_slice(BODY.as_bytes()).unwrap();
        log::debug!("{:?}", result);

        assert_eq!(2, result.statements.len());
        assert_eq!(1, result.series_count());
        assert_eq!(2, result.row_count());

        let series = &result.statements[0].series[0];
        assert_eq!(Some("cpu_load_short"), series.name.as_deref());
        assert_eq!(vec!["time", "value", "host"], series.columns);
        assert_eq!(Value::Integer(1257894000000000000), series.values[0][0]);
        assert_eq!(Value::Float(0.64), series.values[0][1]);
        assert_eq!(Value::String("server01".to_string()), series.values[0][2]);
    }

    #[test]
    fn test_statement_without_series_is_empty_not_error() {
        let result = decode_slice(BODY.as_bytes()).unwrap();

        assert_eq!(1, result.statements[1].statement_id);
        assert!(result.statements[1].series.is_empty());
    }

    #[test]
    fn test_rows_iteration() {
        let result = decode_slice(BODY.as_bytes()).unwrap();

        let rows: Vec<_> = result.rows().collect();
        assert_eq!(2, rows.len());

        let (values, meta) = &rows[1];
        assert_eq!(Value::Float(0.65), values[1]);
        assert_eq!(Some("cpu_load_short"), meta.name);
        assert_eq!(0, meta.statement_id);
    }

    #[test]
    fn test_rows_with_shaping_function() {
        let result = decode_slice(BODY.as_bytes()).unwrap();

        let shaped: Vec<BTreeMap<String, Value>> = result
            .rows_with(|values, meta| meta.columns.iter().cloned().zip(values.iter().cloned()).collect())
            .collect();

        assert_eq!(Some(&Value::String("server01".to_string())), shaped[0].get("host"));
    }

    #[test]
    fn test_tags_and_label() {
        let body = r#"{"results": [{"statement_id": 0, "series": [
            {"name": "m", "columns": ["time", "v"], "tags": {"host": "a", "dc": "x"}, "values": [[1, 2]]}
        ]}]}"#;

        let result = decode_slice(body.as_bytes()).unwrap();
        let series = &result.statements[0].series[0];

        assert_eq!("m,dc=x,host=a", series.label());
        assert_eq!(Some(1), series.column_index("v"));
    }

    #[test]
    fn test_missing_mandatory_keys_fail() {
        // series present but no columns
        let body = r#"{"results": [{"statement_id": 0, "series": [{"name": "m", "values": [[1]]}]}]}"#;
        assert!(decode_slice(body.as_bytes()).is_err());

        // series present but no values
        let body = r#"{"results": [{"statement_id": 0, "series": [{"name": "m", "columns": ["time"]}]}]}"#;
        assert!(decode_slice(body.as_bytes()).is_err());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let body = r#"{"results": [{"statement_id": 0, "partial": true, "series": [
            {"name": "m", "columns": ["time"], "values": [[1]], "future_key": {"x": 1}}
        ]}], "trailer": null}"#;

        let result = decode_slice(body.as_bytes()).unwrap();
        assert_eq!(1, result.row_count());
    }

    #[test]
    fn test_statement_id_fallback_to_position() {
        let body = r#"{"results": [{}, {}]}"#;

        let result = decode_slice(body.as_bytes()).unwrap();
        assert_eq!(0, result.statements[0].statement_id);
        assert_eq!(1, result.statements[1].statement_id);
    }
}
