//! Columnar bridge.
//!
//! A [`Frame`] is a small columnar table: named typed column vectors plus a
//! nanosecond timestamp index. The write direction zips the columns row by
//! row and delegates each row to the line encoder; the read direction
//! rebuilds frames from decoded [`Series`] values, inferring each column's
//! kind from the data.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use chrono::DateTime;

use crate::{
    error::CodecError,
    line::{parse_datetime_text, EncodeOptions, LineBatch, Precision},
    model::{Point, Value},
    query::{QueryResult, Series},
    CodecResult,
};

/// One column's values. `None` cells are absent on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Bool(Vec<Option<bool>>),
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    /// Epoch nanoseconds. Not writable as a field unless coerced to text.
    Timestamp(Vec<Option<i64>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Integer(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }

    fn value_at(&self, row: usize) -> Value {
        match self {
            Self::Bool(v) => v[row].map(Value::Boolean).unwrap_or_default(),
            Self::Integer(v) => v[row].map(Value::Integer).unwrap_or_default(),
            Self::Float(v) => v[row].map(Value::Float).unwrap_or_default(),
            Self::Text(v) => v[row].clone().map(Value::String).unwrap_or_default(),
            Self::Timestamp(v) => v[row].map(Value::Integer).unwrap_or_default(),
        }
    }
}

/// Render a cell as tag text. `None` means the tag is absent for that row.
fn tag_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Boolean(b) => Some(if *b { "true".to_string() } else { "false".to_string() }),
        Value::Integer(n) => Some(n.to_string()),
        Value::Float(d) => Some(d.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::DateTime(dt) => Some(dt.to_rfc3339()),
    }
}

fn ns_to_rfc3339(ns: i64) -> String {
    DateTime::from_timestamp_nanos(ns).to_rfc3339()
}

/// A columnar table keyed by a nanosecond timestamp index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Row index, epoch nanoseconds. Absent for series that carry no time
    /// column (meta queries); such frames cannot be written back.
    pub index: Option<Vec<i64>>,

    /// Named columns, in declaration order.
    pub columns: Vec<(String, ColumnData)>,
}

impl Frame {
    pub fn new(index: Vec<i64>) -> Self {
        Self {
            index: Some(index),
            columns: Vec::new(),
        }
    }

    /// Add one column.
    pub fn column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.push((name.into(), data));
        self
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index
            .as_ref()
            .map(|i| i.len())
            .or_else(|| self.columns.first().map(|(_, c)| c.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_data(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub(crate) fn validate(&self) -> CodecResult<()> {
        let rows = self.len();
        for (name, data) in &self.columns {
            if data.len() != rows {
                return Err(CodecError::Schema(format!(
                    "column {:?} has {} rows, frame has {}",
                    name,
                    data.len(),
                    rows
                )));
            }
        }

        Ok(())
    }

    /// Build a frame from one decoded series. The `time` column becomes the
    /// index; every other column's kind is inferred from its values.
    pub fn from_series(series: &Series) -> CodecResult<Frame> {
        let time_index = series.column_index("time");

        let mut index: Option<Vec<i64>> = time_index.map(|_| Vec::with_capacity(series.values.len()));

        if let (Some(at), Some(index)) = (time_index, index.as_mut()) {
            for row in &series.values {
                let cell = row.get(at).unwrap_or(&Value::Null);
                let ns = match cell {
                    Value::Integer(ns) => *ns,
                    Value::String(s) => parse_datetime_text(s)?
                        .timestamp_nanos_opt()
                        .ok_or_else(|| CodecError::Timestamp(format!("time out of nanosecond range: {:?}", s)))?,
                    other => {
                        return Err(CodecError::Timestamp(format!("time column holds a {} value", other.kind_name())));
                    }
                };
                index.push(ns);
            }
        }

        let mut columns = Vec::new();

        for (at, name) in series.columns.iter().enumerate() {
            if Some(at) == time_index {
                continue;
            }

            let cells: Vec<&Value> = series.values.iter().map(|row| row.get(at).unwrap_or(&Value::Null)).collect();
            columns.push((name.clone(), build_column(name, &cells)?));
        }

        Ok(Frame { index, columns })
    }
}

/// Infer one column's kind from its values and materialize it.
/// Text wins over numbers in mixed columns; integers widen into floats.
fn build_column(name: &str, cells: &[&Value]) -> CodecResult<ColumnData> {
    let mut saw_text = false;
    let mut saw_float = false;
    let mut saw_integer = false;
    let mut saw_bool = false;

    for cell in cells {
        match cell {
            Value::Null => {}
            Value::String(_) => saw_text = true,
            Value::Float(_) => saw_float = true,
            Value::Integer(_) => saw_integer = true,
            Value::Boolean(_) => saw_bool = true,
            Value::DateTime(_) => {
                return Err(CodecError::UnsupportedColumnType(format!("column {:?} holds datetime cells", name)));
            }
        }
    }

    let data = if saw_text {
        ColumnData::Text(cells.iter().map(|&c| tag_text(c)).collect())
    } else if saw_float {
        ColumnData::Float(cells.iter().map(|c| c.as_f64()).collect())
    } else if saw_integer {
        ColumnData::Integer(cells.iter().map(|c| c.as_i64()).collect())
    } else if saw_bool {
        ColumnData::Bool(cells.iter().map(|c| c.as_bool()).collect())
    } else {
        // all-null column; text is the least surprising shape
        ColumnData::Text(vec![None; cells.len()])
    };

    Ok(data)
}

/// How tag columns are chosen when writing a frame.
#[derive(Debug, Clone, Default)]
pub enum TagSelection {
    /// No column is a tag.
    #[default]
    None,
    /// Text columns with few distinct values (at most 256, and at most half
    /// the row count) are treated as tags.
    Infer,
    /// Exactly these columns are tags.
    Explicit(Vec<String>),
}

/// Options for writing a frame.
#[derive(Debug, Clone)]
pub struct FrameWriteOptions {
    /// Measurement for every row. Mandatory: frames carry no measurement.
    pub measurement: String,

    pub tag_columns: TagSelection,

    /// Tags added to every row.
    pub extra_tags: BTreeMap<String, String>,

    pub precision: Precision,

    /// Timestamp-kind data columns named here are written as RFC 3339 text
    /// fields instead of being rejected.
    pub coerce_to_text: Vec<String>,
}

impl FrameWriteOptions {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tag_columns: TagSelection::default(),
            extra_tags: BTreeMap::new(),
            precision: Precision::default(),
            coerce_to_text: Vec::new(),
        }
    }

    /// Name the tag columns explicitly.
    pub fn tag_columns(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tag_columns = TagSelection::Explicit(names.into_iter().map(Into::into).collect());
        self
    }

    /// Infer tag columns from cardinality.
    pub fn infer_tag_columns(mut self) -> Self {
        self.tag_columns = TagSelection::Infer;
        self
    }

    /// Add one tag applied to every row.
    pub fn extra_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_tags.insert(key.into(), value.into());
        self
    }

    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Write the named timestamp-kind column as RFC 3339 text.
    pub fn coerce_to_text(mut self, name: impl Into<String>) -> Self {
        self.coerce_to_text.push(name.into());
        self
    }
}

fn resolve_tag_columns(frame: &Frame, selection: &TagSelection) -> CodecResult<BTreeSet<String>> {
    match selection {
        TagSelection::None => Ok(BTreeSet::new()),

        TagSelection::Explicit(names) => {
            let mut set = BTreeSet::new();
            for name in names {
                if frame.column_data(name).is_none() {
                    return Err(CodecError::Schema(format!("tag column {:?} is not in the frame", name)));
                }
                set.insert(name.clone());
            }
            Ok(set)
        }

        TagSelection::Infer => {
            let rows = frame.len();
            let mut set = BTreeSet::new();

            for (name, data) in &frame.columns {
                let ColumnData::Text(cells) = data else {
                    continue;
                };

                let distinct: BTreeSet<&str> = cells.iter().flatten().map(String::as_str).collect();
                if !distinct.is_empty() && distinct.len() <= 256 && distinct.len() * 2 <= rows {
                    set.insert(name.clone());
                }
            }

            log::debug!("inferred tag columns: {:?}", set);
            Ok(set)
        }
    }
}

/// Write a whole frame as line protocol, one line per row, newline-joined.
///
/// Tag cells that are `None` skip that tag for the row; field cells that
/// are `None` skip that field. A row left with no fields at all fails.
pub fn serialize(frame: &Frame, options: &FrameWriteOptions) -> CodecResult<Bytes> {
    frame.validate()?;

    let index = match &frame.index {
        Some(index) => index,
        None => return Err(CodecError::Schema("frame has no time index".to_string())),
    };

    let tag_columns = resolve_tag_columns(frame, &options.tag_columns)?;

    // reject unwritable column kinds before touching any row
    for (name, data) in &frame.columns {
        if tag_columns.contains(name) {
            continue;
        }
        if matches!(data, ColumnData::Timestamp(_)) && !options.coerce_to_text.contains(name) {
            return Err(CodecError::UnsupportedColumnType(format!(
                "column {:?} is {} and cannot be a field; coerce it to text to write it",
                name,
                data.kind_name()
            )));
        }
    }

    let encode_options = EncodeOptions {
        measurement: None,
        extra_tags: options.extra_tags.clone(),
        precision: options.precision,
    };

    let mut batch = LineBatch::new();

    for (row, ts_ns) in index.iter().enumerate() {
        let mut point = Point::new().measurement(&options.measurement).timestamp_ns(*ts_ns);

        for (name, data) in &frame.columns {
            let cell = data.value_at(row);

            if tag_columns.contains(name) {
                if let Some(text) = tag_text(&cell) {
                    point.tags.insert(name.clone(), text);
                }
            } else if matches!(data, ColumnData::Timestamp(_)) {
                if let Value::Integer(ns) = cell {
                    point.fields.push((name.clone(), Value::String(ns_to_rfc3339(ns))));
                }
            } else {
                point.fields.push((name.clone(), cell));
            }
        }

        batch.push_point(&point, &encode_options)?;
    }

    Ok(batch.into_bytes())
}

/// Build frames for a whole decoded response: one map per statement, keyed
/// by series label. A statement with no series yields an empty map.
pub fn frames_from_result(result: &QueryResult) -> CodecResult<Vec<BTreeMap<String, Frame>>> {
    let mut statements = Vec::with_capacity(result.statements.len());

    for statement in &result.statements {
        let mut frames = BTreeMap::new();
        for series in &statement.series {
            frames.insert(series.label(), Frame::from_series(series)?);
        }
        statements.push(frames);
    }

    Ok(statements)
}
