//! User-declared record shapes.
//!
//! A [`Schema`] describes, per record type, an ordered set of named fields
//! each tagged with a semantic role and a primitive kind. Schemas are plain
//! values: declaring one does not touch the caller's own types. A schema is
//! turned into an [`EncoderPlan`](plan::EncoderPlan) by the compiler in
//! [`plan`], once per distinct shape.

mod plan;
pub mod rules;

pub use plan::*;

/// Semantic role of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    /// Supplies the measurement name.
    Measurement,
    /// A tag; serialized in sorted-by-name order.
    Tag,
    /// A tag whose value comes from an enumeration's variant name.
    TagEnum,
    /// A regular field value.
    Field,
    /// The timestamp.
    Time,
    /// Carries no source value; synthesized as a constant `true` field so a
    /// shape with no real field still writes a valid point.
    Placeholder,
}

/// Primitive kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Str,
    /// Text taken from an enumeration's variant name; quoted like `Str`.
    Enum,
    /// Timestamp already expressed as epoch nanoseconds.
    TimeAsInt,
    /// Timestamp as date-time text; offset-less text is taken as UTC.
    TimeAsString,
    /// Timestamp as an in-memory date-time value.
    TimeAsDatetime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub role: FieldRole,
    pub kind: FieldKind,
}

/// A declared record shape. Value identity (`Eq + Hash`) is the cache key
/// for compiled plans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    /// Shape name; doubles as the default measurement name.
    pub name: String,

    /// Field descriptors in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    fn push(mut self, name: impl Into<String>, role: FieldRole, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            role,
            kind,
        });
        self
    }

    /// Declare the field that supplies the measurement name.
    pub fn measurement_field(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Measurement, FieldKind::Str)
    }

    /// Declare a tag field.
    pub fn tag(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Tag, FieldKind::Str)
    }

    /// Declare a tag fed from an enumeration's variant name.
    pub fn tag_enum(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::TagEnum, FieldKind::Enum)
    }

    /// Declare a boolean field.
    pub fn field_bool(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Field, FieldKind::Bool)
    }

    /// Declare an integer field.
    pub fn field_integer(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Field, FieldKind::Int)
    }

    /// Declare a float field.
    pub fn field_float(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Field, FieldKind::Float)
    }

    /// Declare a string field.
    pub fn field_string(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Field, FieldKind::Str)
    }

    /// Declare a string field fed from an enumeration's variant name.
    pub fn field_enum(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Field, FieldKind::Enum)
    }

    /// Declare a placeholder field.
    pub fn placeholder(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Placeholder, FieldKind::Bool)
    }

    /// Declare the timestamp as epoch nanoseconds.
    pub fn time_as_int(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Time, FieldKind::TimeAsInt)
    }

    /// Declare the timestamp as date-time text.
    pub fn time_as_string(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Time, FieldKind::TimeAsString)
    }

    /// Declare the timestamp as an in-memory date-time value.
    pub fn time_as_datetime(self, name: impl Into<String>) -> Self {
        self.push(name, FieldRole::Time, FieldKind::TimeAsDatetime)
    }
}
