use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use crate::{error::CodecError, CodecResult};

use super::{
    rules::{validate_field_name, validate_schema_name, MAX_FIELD_COUNT, RESERVED_FIELD_NAMES},
    FieldDescriptor, FieldKind, FieldRole, Schema,
};

/// One compiled field: descriptor plus the index into the caller's record
/// value slice. Placeholders carry no accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanField {
    pub name: String,
    pub role: FieldRole,
    pub kind: FieldKind,
    pub accessor: Option<usize>,
}

/// Ready-to-use encoding plan for one schema shape.
///
/// Entries are stored in emission order: measurement first if declared,
/// tags sorted ascending by name, fields in declaration order, timestamp
/// last. Accessor indices refer to record values given in schema
/// declaration order with placeholder entries excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderPlan {
    pub(crate) entries: Vec<PlanField>,

    /// Measurement used when neither the record nor the caller supplies one.
    pub(crate) default_measurement: String,

    /// Number of values an encodable record must supply.
    pub(crate) arity: usize,
}

impl EncoderPlan {
    pub fn entries(&self) -> &[PlanField] {
        &self.entries
    }

    pub fn default_measurement(&self) -> &str {
        &self.default_measurement
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

fn role_kind_compatible(role: FieldRole, kind: FieldKind) -> bool {
    match role {
        FieldRole::Measurement => matches!(kind, FieldKind::Str),
        FieldRole::Tag => matches!(kind, FieldKind::Str),
        FieldRole::TagEnum => matches!(kind, FieldKind::Enum | FieldKind::Str),
        FieldRole::Field => matches!(kind, FieldKind::Bool | FieldKind::Int | FieldKind::Float | FieldKind::Str | FieldKind::Enum),
        FieldRole::Placeholder => matches!(kind, FieldKind::Bool),
        FieldRole::Time => matches!(kind, FieldKind::TimeAsInt | FieldKind::TimeAsString | FieldKind::TimeAsDatetime),
    }
}

/// Validate a schema and produce its encoding plan.
///
/// All shape invariants are checked here, once, so the per-record encode
/// path never revalidates. Compilation is idempotent: equal schemas always
/// compile to equal plans.
pub fn compile(schema: &Schema) -> CodecResult<EncoderPlan> {
    if !validate_schema_name(&schema.name) {
        return Err(CodecError::Schema(format!("invalid schema name: {:?}", schema.name)));
    }

    if schema.fields.len() > MAX_FIELD_COUNT {
        return Err(CodecError::Schema(format!("field count exceeds {}", MAX_FIELD_COUNT)));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut measurement: Option<PlanField> = None;
    let mut tags: Vec<PlanField> = Vec::new();
    let mut fields: Vec<PlanField> = Vec::new();
    let mut time: Option<PlanField> = None;

    let mut accessor = 0usize;

    for FieldDescriptor { name, role, kind } in &schema.fields {
        if !validate_field_name(name) {
            return Err(CodecError::Schema(format!("invalid field name: {:?}", name)));
        }

        if RESERVED_FIELD_NAMES.contains(&name.as_str()) {
            return Err(CodecError::Schema(format!("reserved field name: {:?}", name)));
        }

        if !seen.insert(name) {
            return Err(CodecError::Schema(format!("duplicate field name: {:?}", name)));
        }

        if !role_kind_compatible(*role, *kind) {
            return Err(CodecError::Schema(format!("field {:?}: role {:?} does not accept kind {:?}", name, role, kind)));
        }

        let entry = PlanField {
            name: name.clone(),
            role: *role,
            kind: *kind,
            accessor: if *role == FieldRole::Placeholder {
                None
            } else {
                let i = accessor;
                accessor += 1;
                Some(i)
            },
        };

        match role {
            FieldRole::Measurement => {
                if measurement.is_some() {
                    return Err(CodecError::Schema("more than one Measurement field".to_string()));
                }
                measurement = Some(entry);
            }

            FieldRole::Tag | FieldRole::TagEnum => tags.push(entry),

            FieldRole::Field | FieldRole::Placeholder => fields.push(entry),

            FieldRole::Time => {
                if time.is_some() {
                    return Err(CodecError::Schema("more than one Time field".to_string()));
                }
                time = Some(entry);
            }
        }
    }

    let time = match time {
        Some(t) => t,
        None => return Err(CodecError::Schema("missing Time field".to_string())),
    };

    if fields.is_empty() {
        return Err(CodecError::Schema("schema declares no Field or Placeholder entries".to_string()));
    }

    // Canonical tag order is fixed at compile time, not per record.
    tags.sort_by(|a, b| a.name.cmp(&b.name));

    let mut entries = Vec::with_capacity(schema.fields.len());
    if let Some(m) = measurement {
        entries.push(m);
    }
    entries.extend(tags);
    entries.extend(fields);
    entries.push(time);

    Ok(EncoderPlan {
        entries,
        default_measurement: schema.name.clone(),
        arity: accessor,
    })
}

/// Process-wide cache of compiled plans, keyed by schema value identity.
///
/// Read-mostly: lookups take the read lock only. A miss compiles outside
/// any lock and then publishes under the write lock, so concurrent readers
/// never wait on a compile.
#[derive(Debug, Default)]
pub struct PlanCache {
    inner: RwLock<HashMap<Schema, Arc<EncoderPlan>>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached plan for `schema`, compiling and publishing it on
    /// first sight of the shape.
    pub fn get_or_compile(&self, schema: &Schema) -> CodecResult<Arc<EncoderPlan>> {
        if let Some(plan) = self.inner.read().unwrap().get(schema) {
            return Ok(Arc::clone(plan));
        }

        let plan = Arc::new(compile(schema)?);

        let mut guard = self.inner.write().unwrap();
        // Another thread may have published the same shape in between.
        let entry = guard.entry(schema.clone()).or_insert_with(|| {
            log::debug!("publishing encoder plan for shape {:?}", schema.name);
            plan
        });

        Ok(Arc::clone(entry))
    }

    /// Number of distinct shapes compiled so far.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}
