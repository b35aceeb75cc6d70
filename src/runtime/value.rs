use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use crate::runtime::{
    alloc_stats, environment::EnvRef, error::RuntimeError, record::RecordValue,
};

/// Shared handle to a runtime value.
///
/// Every environment slot, array cell, dict entry, and record field holds one
/// of these. A value is destroyed when its last handle disappears, except
/// when it participates in a reference cycle; those are reclaimed by the
/// cycle collector in `runtime::gc`.
pub type ValueRef = Arc<Value>;

/// Declared type of a record field or closure parameter.
///
/// `Record` names another record definition; the record registry rejects
/// definitions whose field types close a cycle through these names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Any,
    Int,
    Float,
    Bool,
    Str,
    Array,
    Dict,
    Record(String),
}

/// Closure parameter metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeTag,
}

/// A function value: signature metadata plus the environment captured at the
/// definition point. The body itself is owned by the host interpreter and
/// referenced by an opaque id.
#[derive(Clone)]
pub struct Closure {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeTag,
    /// Environment active when the function was defined.
    pub env: EnvRef,
    /// Opaque handle into the host interpreter's AST store.
    pub body: u64,
}

/// Opaque handle to an object owned by a language backend.
///
/// The core never frees foreign memory: the backend that created the object
/// releases it when the last handle drops.
pub trait ForeignObject: Send + Sync {
    fn language(&self) -> &str;
    fn type_name(&self) -> &str;

    fn describe(&self) -> String {
        format!("<{} object: {}>", self.language(), self.type_name())
    }
}

/// A unit of foreign-language source bound to one executor.
#[derive(Debug, Clone)]
pub struct BlockHandle {
    pub id: String,
    pub language: String,
    pub source: Arc<str>,
    /// Whether this handle owns the block or merely borrows a registered one.
    pub owned: bool,
}

/// The universal runtime datum.
///
/// The tag never changes after construction. Array and dict contents and
/// record fields are the only state mutated in place; everything else is an
/// immutable container replaced by rebinding.
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Array(RwLock<Vec<ValueRef>>),
    Dict(RwLock<HashMap<String, ValueRef>>),
    Closure(Closure),
    Record(RecordValue),
    Foreign(Arc<dyn ForeignObject>),
    Block(BlockHandle),
}

impl Value {
    pub fn null() -> ValueRef {
        Arc::new(Value::Null)
    }

    pub fn int(v: i64) -> ValueRef {
        Arc::new(Value::Int(v))
    }

    pub fn float(v: f64) -> ValueRef {
        Arc::new(Value::Float(v))
    }

    pub fn bool(v: bool) -> ValueRef {
        Arc::new(Value::Bool(v))
    }

    pub fn str(v: impl Into<String>) -> ValueRef {
        Arc::new(Value::Str(v.into()))
    }

    /// Raw array constructor. Prefer [`crate::runtime::gc::ValueTracker::array`]
    /// so the value is visible to the cycle collector.
    pub fn array(elements: Vec<ValueRef>) -> ValueRef {
        alloc_stats::record_array();
        Arc::new(Value::Array(RwLock::new(elements)))
    }

    /// Raw dict constructor. Prefer [`crate::runtime::gc::ValueTracker::dict`]
    /// so the value is visible to the cycle collector.
    pub fn dict(entries: HashMap<String, ValueRef>) -> ValueRef {
        alloc_stats::record_dict();
        Arc::new(Value::Dict(RwLock::new(entries)))
    }

    pub fn closure(closure: Closure) -> ValueRef {
        alloc_stats::record_closure();
        Arc::new(Value::Closure(closure))
    }

    pub fn record(record: RecordValue) -> ValueRef {
        alloc_stats::record_record();
        Arc::new(Value::Record(record))
    }

    pub fn foreign(object: Arc<dyn ForeignObject>) -> ValueRef {
        Arc::new(Value::Foreign(object))
    }

    pub fn block(handle: BlockHandle) -> ValueRef {
        Arc::new(Value::Block(handle))
    }

    /// Returns the canonical runtime type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
            Value::Closure(_) => "closure",
            Value::Record(_) => "record",
            Value::Foreign(_) => "foreign",
            Value::Block(_) => "block",
        }
    }

    /// Truthiness by emptiness/zero-ness: `null`, `0`, `0.0`, `false`, the
    /// empty string, and empty arrays/dicts are falsy; everything else is
    /// truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Bool(v) => *v,
            Value::Str(v) => !v.is_empty(),
            Value::Array(elements) => !elements.read().is_empty(),
            Value::Dict(entries) => !entries.read().is_empty(),
            _ => true,
        }
    }

    /// Converts to an integer with lossless-or-error semantics.
    ///
    /// Floats convert only when integral and in range; strings must parse.
    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Bool(v) => Ok(i64::from(*v)),
            Value::Float(v) => {
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v <= i64::MAX as f64 {
                    Ok(*v as i64)
                } else {
                    Err(self
                        .conversion_error("int", "value has a fractional part or is out of range"))
                }
            }
            Value::Str(v) => v.trim().parse::<i64>().map_err(|e| {
                self.conversion_error("int", format!("'{}' does not parse: {}", v, e))
            }),
            _ => Err(self.conversion_error("int", "not a numeric value")),
        }
    }

    /// Infallible conversion to bool; alias for [`is_truthy`].
    ///
    /// [`is_truthy`]: Value::is_truthy
    pub fn as_bool(&self) -> bool {
        self.is_truthy()
    }

    /// Converts to a float; strings must parse, everything non-numeric fails.
    pub fn as_float(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v),
            Value::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Value::Str(v) => v.trim().parse::<f64>().map_err(|e| {
                self.conversion_error("float", format!("'{}' does not parse: {}", v, e))
            }),
            _ => Err(self.conversion_error("float", "not a numeric value")),
        }
    }

    /// Canonical string form: numbers format canonically, strings are
    /// returned without quotes.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(v) => v.clone(),
            other => other.to_string(),
        }
    }

    fn conversion_error(&self, to: &'static str, reason: impl Into<String>) -> RuntimeError {
        RuntimeError::TypeConversion {
            from: self.type_name().to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    /// Marshals a value into JSON for the executor wire format.
    ///
    /// Records marshal as objects of their fields. Closures, foreign handles,
    /// and block handles cannot cross the boundary and fail with
    /// `TypeConversion`.
    pub fn to_json(&self) -> Result<JsonValue, RuntimeError> {
        match self {
            Value::Null => Ok(JsonValue::Null),
            Value::Int(v) => Ok(JsonValue::from(*v)),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .ok_or_else(|| self.conversion_error("json", "non-finite float")),
            Value::Bool(v) => Ok(JsonValue::Bool(*v)),
            Value::Str(v) => Ok(JsonValue::String(v.clone())),
            Value::Array(elements) => {
                let snapshot: Vec<ValueRef> = elements.read().clone();
                let mut out = Vec::with_capacity(snapshot.len());
                for element in &snapshot {
                    out.push(element.to_json()?);
                }
                Ok(JsonValue::Array(out))
            }
            Value::Dict(entries) => {
                let snapshot: Vec<(String, ValueRef)> = entries
                    .read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut map = serde_json::Map::with_capacity(snapshot.len());
                for (key, value) in &snapshot {
                    map.insert(key.clone(), value.to_json()?);
                }
                Ok(JsonValue::Object(map))
            }
            Value::Record(record) => {
                let mut map = serde_json::Map::new();
                for (name, value) in record.fields_with_names() {
                    map.insert(name, value.to_json()?);
                }
                Ok(JsonValue::Object(map))
            }
            _ => {
                Err(self.conversion_error("json", "not representable across the language boundary"))
            }
        }
    }

    /// Builds a value from JSON produced by a language backend.
    ///
    /// Integral numbers become `Int`, everything else numeric becomes
    /// `Float`. The resulting compound values are untracked; callers that
    /// keep them should register them with the value tracker.
    pub fn from_json(json: &JsonValue) -> ValueRef {
        match json {
            JsonValue::Null => Value::null(),
            JsonValue::Bool(v) => Value::bool(*v),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::int(i)
                } else {
                    Value::float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Value::str(s.clone()),
            JsonValue::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::dict(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Deep structural copy used by assignment of compound values.
///
/// Arrays, dicts, and records are copied; scalars, closures, foreign
/// handles, and block handles are shared. Aliasing inside the copied graph
/// is preserved (a self-referential array copies to a self-referential
/// array), which also makes the walk cycle-safe. Every compound value
/// created by the copy is pushed onto `created` so the caller can register
/// it with the value tracker.
pub(crate) fn deep_copy_collect(value: &ValueRef, created: &mut Vec<ValueRef>) -> ValueRef {
    let mut seen: HashMap<usize, ValueRef> = HashMap::new();
    copy_graph(value, &mut seen, created)
}

/// Deep copy without tracker registration. See [`deep_copy_collect`].
pub fn deep_copy(value: &ValueRef) -> ValueRef {
    let mut created = Vec::new();
    deep_copy_collect(value, &mut created)
}

fn copy_graph(
    value: &ValueRef,
    seen: &mut HashMap<usize, ValueRef>,
    created: &mut Vec<ValueRef>,
) -> ValueRef {
    let key = Arc::as_ptr(value) as *const () as usize;
    match &**value {
        Value::Array(elements) => {
            if let Some(existing) = seen.get(&key) {
                return existing.clone();
            }
            let copy = Value::array(Vec::new());
            seen.insert(key, copy.clone());
            created.push(copy.clone());
            let snapshot: Vec<ValueRef> = elements.read().clone();
            let copied: Vec<ValueRef> = snapshot
                .iter()
                .map(|e| copy_graph(e, seen, created))
                .collect();
            if let Value::Array(slot) = &*copy {
                *slot.write() = copied;
            }
            copy
        }
        Value::Dict(entries) => {
            if let Some(existing) = seen.get(&key) {
                return existing.clone();
            }
            let copy = Value::dict(HashMap::new());
            seen.insert(key, copy.clone());
            created.push(copy.clone());
            let snapshot: Vec<(String, ValueRef)> = entries
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let copied: HashMap<String, ValueRef> = snapshot
                .iter()
                .map(|(k, v)| (k.clone(), copy_graph(v, seen, created)))
                .collect();
            if let Value::Dict(slot) = &*copy {
                *slot.write() = copied;
            }
            copy
        }
        Value::Record(record) => {
            if let Some(existing) = seen.get(&key) {
                return existing.clone();
            }
            // The definition handle is shared; only the field slots copy.
            let copy = Value::record(RecordValue::uninitialized(record.def().clone()));
            seen.insert(key, copy.clone());
            created.push(copy.clone());
            let snapshot = record.fields_snapshot();
            let copied: Vec<ValueRef> = snapshot
                .iter()
                .map(|v| copy_graph(v, seen, created))
                .collect();
            if let Value::Record(slot) = &*copy {
                slot.replace_fields(copied);
            }
            copy
        }
        _ => value.clone(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::Array(elements) => {
                let items: Vec<String> = elements.read().iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Dict(entries) => {
                let items: Vec<String> = entries
                    .read()
                    .iter()
                    .map(|(k, v)| format!("\"{}\": {}", k, v))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Value::Closure(c) => write!(f, "<function {}>", c.name),
            Value::Record(r) => write!(f, "{}", r),
            Value::Foreign(obj) => write!(f, "{}", obj.describe()),
            Value::Block(b) => write!(f, "<block {} ({})>", b.id, b.language),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(v) => write!(f, "Str({:?})", v),
            other => write!(f, "{}({})", other.type_name(), other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let a = a.read().clone();
                let b = b.read().clone();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let a = a.read().clone();
                let b = b.read().clone();
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v == w))
            }
            (Value::Closure(a), Value::Closure(b)) => {
                a.name == b.name && a.body == b.body && Arc::ptr_eq(&a.env, &b.env)
            }
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Foreign(a), Value::Foreign(b)) => Arc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => a.id == b.id && a.language == b.language,
            _ => false,
        }
    }
}
