use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::Value;

/// A single measurement point, the unit of write.
///
/// Tags are kept in a sorted map because the wire format wants canonical
/// ascending tag order. Fields keep their insertion order.
#[derive(Debug, Default, Clone)]
pub struct Point {
    /// Measurement name. May be left unset when the caller supplies an
    /// override at encode time.
    pub measurement: Option<String>,

    /// Tag set. Values are always text on the wire.
    pub tags: BTreeMap<String, String>,

    /// Field set, in insertion order.
    pub fields: Vec<(String, Value)>,

    /// Time value: integer nanoseconds, a date-time, or parseable text.
    /// `Value::Null` means the point carries no timestamp.
    pub time: Value,
}

impl Point {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the measurement name.
    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = Some(measurement.into());
        self
    }

    /// Add one tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replace the whole tag set.
    pub fn tags(mut self, tags: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        self.tags = tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Add one field with any supported value.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Add a string field.
    pub fn field_string(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.field(name, Value::String(value.into()))
    }

    /// Add an integer field.
    pub fn field_integer(self, name: impl Into<String>, value: i64) -> Self {
        self.field(name, Value::Integer(value))
    }

    /// Add a float field.
    pub fn field_float(self, name: impl Into<String>, value: f64) -> Self {
        self.field(name, Value::Float(value))
    }

    /// Add a boolean field.
    pub fn field_bool(self, name: impl Into<String>, value: bool) -> Self {
        self.field(name, Value::Boolean(value))
    }

    /// Set the timestamp as epoch nanoseconds.
    pub fn timestamp_ns(mut self, ts_ns: i64) -> Self {
        self.time = Value::Integer(ts_ns);
        self
    }

    /// Set the timestamp from a date-time value.
    pub fn datetime(mut self, dt: DateTime<Utc>) -> Self {
        self.time = Value::DateTime(dt);
        self
    }

    /// Set the time value directly. Text values are parsed at encode time;
    /// values without an offset are taken as UTC.
    pub fn time(mut self, time: impl Into<Value>) -> Self {
        self.time = time.into();
        self
    }
}
