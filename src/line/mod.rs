//! Line protocol encoding.
//!
//! One point per line: `measurement[,tag=value...] field=value[,...] [timestamp]`.
//! Tags are emitted in ascending key order regardless of input order; fields
//! keep their declaration order. The two paths are the untyped [`Point`]
//! path, which infers field kinds from runtime values, and the compiled
//! [`EncoderPlan`] path, which pulls record values positionally.

mod time;

pub use time::*;

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::CodecError,
    escape::{escape_identifier, escape_measurement, escape_string_field, format_bool, format_float, format_integer},
    model::{Point, Value},
    schema::{EncoderPlan, FieldKind, FieldRole},
    CodecResult,
};

/// Per-call encoding options.
#[derive(Debug, Default, Clone)]
pub struct EncodeOptions {
    /// Measurement override. Always wins over whatever the record carries.
    pub measurement: Option<String>,

    /// Tags merged into every encoded record, overriding same-named tags.
    pub extra_tags: BTreeMap<String, String>,

    /// Timestamp precision on the wire.
    pub precision: Precision,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the measurement override.
    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = Some(measurement.into());
        self
    }

    /// Add one extra tag.
    pub fn extra_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_tags.insert(key.into(), value.into());
        self
    }

    /// Set the timestamp precision.
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
}

/// Render a field value of inferred kind.
fn render_field_value(name: &str, value: &Value) -> CodecResult<String> {
    match value {
        Value::Boolean(b) => Ok(format_bool(*b).to_string()),
        Value::Integer(n) => Ok(format_integer(*n)),
        Value::Float(d) => Ok(format_float(*d)),
        Value::String(s) => escape_string_field(s),
        other => Err(CodecError::UnsupportedType(format!(
            "field {:?} has no line protocol mapping for {} values",
            name,
            other.kind_name()
        ))),
    }
}

/// Assemble one line from resolved parts. `fields` values are already
/// rendered; tag values are raw and get escaped here.
fn render_line(measurement: &str, tags: &BTreeMap<String, String>, fields: &[(String, String)], ts_ns: Option<i64>, precision: Precision) -> CodecResult<String> {
    if fields.is_empty() {
        return Err(CodecError::Encoding("point has no fields".to_string()));
    }

    let mut line = escape_measurement(measurement)?;

    for (k, v) in tags {
        // blank tag value means the tag is absent
        if v.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_identifier(k)?);
        line.push('=');
        line.push_str(&escape_identifier(v)?);
    }

    line.push(' ');

    for (i, (k, rendered)) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&escape_identifier(k)?);
        line.push('=');
        line.push_str(rendered);
    }

    if let Some(ns) = ts_ns {
        line.push(' ');
        line.push_str(&(ns / precision.divisor()).to_string());
    }

    Ok(line)
}

/// Encode one untyped point.
///
/// Field kinds are inferred from the runtime values. `Null` fields are
/// skipped; a point whose fields all skip fails. The measurement override
/// in `options` wins over the point's own measurement; with neither set
/// the point is malformed.
pub fn encode_point(point: &Point, options: &EncodeOptions) -> CodecResult<String> {
    let measurement = match options.measurement.as_deref().or(point.measurement.as_deref()) {
        Some(m) => m,
        None => return Err(CodecError::Schema("'measurement' missing".to_string())),
    };

    let mut tags = point.tags.clone();
    tags.extend(options.extra_tags.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut fields = Vec::with_capacity(point.fields.len());
    for (name, value) in &point.fields {
        if value.is_null() {
            continue;
        }
        fields.push((name.clone(), render_field_value(name, value)?));
    }

    let ts_ns = time_value_to_ns(&point.time)?;

    render_line(measurement, &tags, &fields, ts_ns, options.precision)
}

fn record_time_to_ns(kind: FieldKind, name: &str, value: &Value) -> CodecResult<Option<i64>> {
    match (kind, value) {
        (_, Value::Null) => Ok(None),
        (FieldKind::TimeAsInt, Value::Integer(ns)) => Ok(Some(*ns)),
        (FieldKind::TimeAsString, Value::String(s)) => Ok(Some(datetime_to_ns(&parse_datetime_text(s)?)?)),
        (FieldKind::TimeAsDatetime, Value::DateTime(dt)) => Ok(Some(datetime_to_ns(dt)?)),
        (_, other) => Err(CodecError::Timestamp(format!(
            "time field {:?} declared {:?} but got a {} value",
            name,
            kind,
            other.kind_name()
        ))),
    }
}

fn record_field_value(kind: FieldKind, name: &str, value: &Value) -> CodecResult<Option<String>> {
    let rendered = match (kind, value) {
        (_, Value::Null) => return Ok(None),
        (FieldKind::Bool, Value::Boolean(b)) => format_bool(*b).to_string(),
        (FieldKind::Int, Value::Integer(n)) => format_integer(*n),
        (FieldKind::Float, Value::Float(d)) => format_float(*d),
        // integer values widen into a declared float field
        (FieldKind::Float, Value::Integer(n)) => format_float(*n as f64),
        (FieldKind::Str | FieldKind::Enum, Value::String(s)) => escape_string_field(s)?,
        (_, other) => {
            return Err(CodecError::UnsupportedType(format!(
                "field {:?} declared {:?} but got a {} value",
                name,
                kind,
                other.kind_name()
            )))
        }
    };

    Ok(Some(rendered))
}

/// Encode one schema-bound record against its compiled plan.
///
/// `values` are given in schema declaration order with placeholder entries
/// excluded; the plan's accessors map them to emission positions. The same
/// input always renders the same line.
pub fn encode_record(plan: &EncoderPlan, values: &[Value], options: &EncodeOptions) -> CodecResult<String> {
    if values.len() != plan.arity() {
        return Err(CodecError::Schema(format!(
            "record arity mismatch: shape {:?} takes {} values, got {}",
            plan.default_measurement(),
            plan.arity(),
            values.len()
        )));
    }

    let mut record_measurement: Option<&str> = None;
    let mut tags: BTreeMap<String, String> = BTreeMap::new();
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut ts_ns: Option<i64> = None;

    for entry in plan.entries() {
        let value = entry.accessor.map(|i| &values[i]);

        match entry.role {
            FieldRole::Measurement => match value {
                Some(Value::String(s)) => record_measurement = Some(s),
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(CodecError::UnsupportedType(format!(
                        "measurement field {:?} wants text, got a {} value",
                        entry.name,
                        other.kind_name()
                    )))
                }
            },

            FieldRole::Tag | FieldRole::TagEnum => match value {
                Some(Value::String(s)) => {
                    tags.insert(entry.name.clone(), s.clone());
                }
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(CodecError::UnsupportedType(format!(
                        "tag {:?} wants text, got a {} value",
                        entry.name,
                        other.kind_name()
                    )))
                }
            },

            FieldRole::Placeholder => {
                fields.push((entry.name.clone(), format_bool(true).to_string()));
            }

            FieldRole::Field => {
                if let Some(rendered) = record_field_value(entry.kind, &entry.name, value.unwrap_or(&Value::Null))? {
                    fields.push((entry.name.clone(), rendered));
                }
            }

            FieldRole::Time => {
                ts_ns = record_time_to_ns(entry.kind, &entry.name, value.unwrap_or(&Value::Null))?;
            }
        }
    }

    let measurement = options
        .measurement
        .as_deref()
        .or(record_measurement)
        .unwrap_or(plan.default_measurement());

    tags.extend(options.extra_tags.iter().map(|(k, v)| (k.clone(), v.clone())));

    render_line(measurement, &tags, &fields, ts_ns, options.precision)
}

/// Accumulates encoded lines into one write body.
///
/// Lines are separated by a single newline; no trailing newline is added.
/// Pre-rendered line protocol text can be appended verbatim.
#[derive(Debug, Default)]
pub struct LineBatch {
    buf: BytesMut,
}

impl LineBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn separate(&mut self) {
        if !self.buf.is_empty() {
            self.buf.put_u8(b'\n');
        }
    }

    /// Append pre-rendered line protocol text verbatim.
    pub fn push_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.separate();
        self.buf.put_slice(text.as_bytes());
    }

    pub fn push_point(&mut self, point: &Point, options: &EncodeOptions) -> CodecResult<()> {
        let line = encode_point(point, options)?;
        self.separate();
        self.buf.put_slice(line.as_bytes());
        Ok(())
    }

    pub fn push_record(&mut self, plan: &EncoderPlan, values: &[Value], options: &EncodeOptions) -> CodecResult<()> {
        let line = encode_record(plan, values, options)?;
        self.separate();
        self.buf.put_slice(line.as_bytes());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Encode a batch of points, newline-joined.
pub fn encode_batch(points: &[Point], options: &EncodeOptions) -> CodecResult<Bytes> {
    let mut batch = LineBatch::new();
    for point in points {
        batch.push_point(point, options)?;
    }
    Ok(batch.into_bytes())
}

#[cfg(test)]
mod test_line {
    use super::*;
    use crate::schema::{compile, Schema};
    use crate::test_util::setup;

    fn sample_point() -> Point {
        Point::new()
            .measurement("cpu")
            .tag("region", "us-west")
            .tag("host", "server01")
            .field_float("value", 0.64)
            .time("2009-11-10T23:00:00Z")
    }

    #[test]
    fn test_encode_point_reference_line() {
        setup();

        let line = encode_point(&sample_point(), &EncodeOptions::new()).unwrap();
        log::debug!("{}", line);

        assert_eq!("cpu,host=server01,region=us-west value=0.64 1257894000000000000", line);
    }

    #[test]
    fn test_tag_order_is_lexical() {
        let point = Point::new()
            .measurement("m")
            .tag("z", "1")
            .tag("a", "2")
            .field_integer("v", 1);

        let line = encode_point(&point, &EncodeOptions::new()).unwrap();
        assert_eq!("m,a=2,z=1 v=1i", line);
    }

    #[test]
    fn test_field_order_is_insertion_order() {
        let point = Point::new().measurement("m").field_integer("z", 1).field_integer("a", 2);

        let line = encode_point(&point, &EncodeOptions::new()).unwrap();
        assert_eq!("m z=1i,a=2i", line);
    }

    #[test]
    fn test_field_kinds_on_the_wire() {
        let point = Point::new()
            .measurement("m")
            .field_bool("up", true)
            .field_integer("count", 3)
            .field_float("load", 1.5)
            .field_string("note", "say \"hi\"");

        let line = encode_point(&point, &EncodeOptions::new()).unwrap();
        assert_eq!("m up=true,count=3i,load=1.5,note=\"say \\\"hi\\\"\"", line);
    }

    #[test]
    fn test_tag_escaping() {
        let point = Point::new().measurement("m").tag("k", "a,b c=d").field_integer("v", 1);

        let line = encode_point(&point, &EncodeOptions::new()).unwrap();
        assert_eq!("m,k=a\\,b\\ c\\=d v=1i", line);
    }

    #[test]
    fn test_blank_tag_skipped() {
        let point = Point::new().measurement("m").tag("empty", "").tag("host", "a").field_integer("v", 1);

        let line = encode_point(&point, &EncodeOptions::new()).unwrap();
        assert_eq!("m,host=a v=1i", line);
    }

    #[test]
    fn test_measurement_resolution() {
        let point = sample_point();

        // override always wins
        let line = encode_point(&point, &EncodeOptions::new().measurement("override")).unwrap();
        assert!(line.starts_with("override,"));

        // no measurement anywhere is malformed
        let point = Point::new().field_integer("v", 1);
        assert!(matches!(encode_point(&point, &EncodeOptions::new()), Err(CodecError::Schema(_))));
    }

    #[test]
    fn test_default_measurement_is_deterministic() {
        let point = sample_point();
        let opts = EncodeOptions::new();

        assert_eq!(encode_point(&point, &opts).unwrap(), encode_point(&point, &opts).unwrap());
    }

    #[test]
    fn test_null_fields_skipped_and_empty_point_rejected() {
        let point = Point::new().measurement("m").field("gone", Value::Null).field_integer("v", 1);
        assert_eq!("m v=1i", encode_point(&point, &EncodeOptions::new()).unwrap());

        let point = Point::new().measurement("m").field("gone", Value::Null);
        assert!(matches!(encode_point(&point, &EncodeOptions::new()), Err(CodecError::Encoding(_))));
    }

    #[test]
    fn test_datetime_field_value_is_unsupported() {
        let point = Point::new()
            .measurement("m")
            .field("when", Value::DateTime(chrono::Utc::now()))
            .field_integer("v", 1);

        assert!(matches!(encode_point(&point, &EncodeOptions::new()), Err(CodecError::UnsupportedType(_))));
    }

    #[test]
    fn test_extra_tags_merge_and_override() {
        let point = Point::new().measurement("m").tag("env", "dev").field_integer("v", 1);
        let opts = EncodeOptions::new().extra_tag("env", "prod").extra_tag("dc", "fra");

        let line = encode_point(&point, &opts).unwrap();
        assert_eq!("m,dc=fra,env=prod v=1i", line);
    }

    #[test]
    fn test_precision_scaling() {
        let point = Point::new().measurement("m").field_integer("v", 1).timestamp_ns(1_257_894_000_000_000_000);

        let line = encode_point(&point, &EncodeOptions::new().precision(Precision::Second)).unwrap();
        assert_eq!("m v=1i 1257894000", line);
    }

    #[test]
    fn test_encode_record() {
        let schema = Schema::new("weather")
            .tag("location")
            .field_float("temperature")
            .field_integer("humidity")
            .time_as_int("timestamp");
        let plan = compile(&schema).unwrap();

        let values = [
            Value::from("berlin"),
            Value::from(21.5),
            Value::from(60i64),
            Value::Integer(1_257_894_000_000_000_000),
        ];

        let line = encode_record(&plan, &values, &EncodeOptions::new()).unwrap();
        assert_eq!("weather,location=berlin temperature=21.5,humidity=60i 1257894000000000000", line);
    }

    #[test]
    fn test_encode_record_measurement_field_and_override() {
        let schema = Schema::new("fallback")
            .measurement_field("series")
            .field_float("v")
            .time_as_int("t");
        let plan = compile(&schema).unwrap();

        let values = [Value::from("actual"), Value::from(1.0), Value::Integer(5)];
        let line = encode_record(&plan, &values, &EncodeOptions::new()).unwrap();
        assert!(line.starts_with("actual "));

        // Null measurement value falls back to the shape name
        let values = [Value::Null, Value::from(1.0), Value::Integer(5)];
        let line = encode_record(&plan, &values, &EncodeOptions::new()).unwrap();
        assert!(line.starts_with("fallback "));

        // caller override beats both
        let line = encode_record(&plan, &values, &EncodeOptions::new().measurement("winner")).unwrap();
        assert!(line.starts_with("winner "));
    }

    #[test]
    fn test_encode_record_placeholder() {
        let schema = Schema::new("heartbeat").tag("host").placeholder("alive").time_as_int("t");
        let plan = compile(&schema).unwrap();

        let values = [Value::from("server01"), Value::Integer(7)];
        let line = encode_record(&plan, &values, &EncodeOptions::new()).unwrap();

        assert_eq!("heartbeat,host=server01 alive=true 7", line);
    }

    #[test]
    fn test_encode_record_time_as_string() {
        let schema = Schema::new("m").field_float("v").time_as_string("t");
        let plan = compile(&schema).unwrap();

        let values = [Value::from(2.0), Value::from("2009-11-10T23:00:00Z")];
        let line = encode_record(&plan, &values, &EncodeOptions::new()).unwrap();
        assert_eq!("m v=2 1257894000000000000", line);

        let values = [Value::from(2.0), Value::from("not a date")];
        assert!(matches!(
            encode_record(&plan, &values, &EncodeOptions::new()),
            Err(CodecError::Timestamp(_))
        ));
    }

    #[test]
    fn test_encode_record_arity_and_kind_mismatch() {
        let schema = Schema::new("m").field_integer("v").time_as_int("t");
        let plan = compile(&schema).unwrap();

        assert!(matches!(
            encode_record(&plan, &[Value::from(1i64)], &EncodeOptions::new()),
            Err(CodecError::Schema(_))
        ));

        assert!(matches!(
            encode_record(&plan, &[Value::from("text"), Value::Integer(1)], &EncodeOptions::new()),
            Err(CodecError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_batch_join() {
        let points = vec![
            Point::new().measurement("m").field_integer("v", 1),
            Point::new().measurement("m").field_integer("v", 2),
        ];

        let body = encode_batch(&points, &EncodeOptions::new()).unwrap();
        assert_eq!(body, "m v=1i\nm v=2i");

        let mut batch = LineBatch::new();
        batch.push_raw("pre rendered=1i");
        batch.push_point(&points[0], &EncodeOptions::new()).unwrap();
        assert_eq!(batch.into_bytes(), "pre rendered=1i\nm v=1i");
    }
}
