use std::{collections::HashMap, collections::HashSet, fmt, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::runtime::{
    error::RuntimeError,
    value::{TypeTag, Value, ValueRef},
};

/// A named, fixed-shape record definition.
///
/// Registered once per name; instances share the definition through an
/// `Arc`, so assigning a definition handle is sharing, never copying.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordDef {
    pub name: String,
    pub fields: Vec<RecordField>,
    field_index: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub name: String,
    pub ty: TypeTag,
}

impl RecordDef {
    pub fn new(name: impl Into<String>, fields: Vec<RecordField>) -> Self {
        let field_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        RecordDef {
            name: name.into(),
            fields,
            field_index,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_index.get(name).copied()
    }

    fn same_shape(&self, other: &RecordDef) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

/// A record instance: shared definition plus in-place mutable field slots.
pub struct RecordValue {
    def: Arc<RecordDef>,
    fields: RwLock<Vec<ValueRef>>,
}

impl RecordValue {
    /// Creates an instance with every field set to `null`.
    pub fn new(def: Arc<RecordDef>) -> Self {
        let fields = (0..def.fields.len()).map(|_| Value::null()).collect();
        RecordValue {
            def,
            fields: RwLock::new(fields),
        }
    }

    /// Creates an instance with empty field slots, for the deep-copy path
    /// which fills them afterwards.
    pub(crate) fn uninitialized(def: Arc<RecordDef>) -> Self {
        RecordValue {
            def,
            fields: RwLock::new(Vec::new()),
        }
    }

    pub fn def(&self) -> &Arc<RecordDef> {
        &self.def
    }

    pub fn type_name(&self) -> &str {
        &self.def.name
    }

    pub fn get_field(&self, name: &str) -> Result<ValueRef, RuntimeError> {
        let index = self.def.field_index(name).ok_or(RuntimeError::UnboundName {
            name: format!("{}.{}", self.def.name, name),
        })?;
        Ok(self.fields.read()[index].clone())
    }

    pub fn set_field(&self, name: &str, value: ValueRef) -> Result<(), RuntimeError> {
        let index = self.def.field_index(name).ok_or(RuntimeError::UnboundName {
            name: format!("{}.{}", self.def.name, name),
        })?;
        self.fields.write()[index] = value;
        Ok(())
    }

    /// Fast path for callers that cached the field index.
    pub fn get_field_by_index(&self, index: usize) -> Option<ValueRef> {
        self.fields.read().get(index).cloned()
    }

    pub fn set_field_by_index(&self, index: usize, value: ValueRef) -> Result<(), RuntimeError> {
        let mut fields = self.fields.write();
        match fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeError::UnboundName {
                name: format!("{}[{}]", self.def.name, index),
            }),
        }
    }

    /// Snapshot of the field slots, used by the GC mark phase and deep copy.
    pub(crate) fn fields_snapshot(&self) -> Vec<ValueRef> {
        self.fields.read().clone()
    }

    pub(crate) fn fields_with_names(&self) -> Vec<(String, ValueRef)> {
        let fields = self.fields.read();
        self.def
            .fields
            .iter()
            .zip(fields.iter())
            .map(|(f, v)| (f.name.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn replace_fields(&self, fields: Vec<ValueRef>) {
        *self.fields.write() = fields;
    }

    /// Drops every field slot. The collector uses this to break cycles.
    pub(crate) fn clear_fields(&self) {
        self.fields.write().clear();
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .fields_with_names()
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect();
        write!(f, "{} {{ {} }}", self.def.name, items.join(", "))
    }
}

impl PartialEq for RecordValue {
    fn eq(&self, other: &RecordValue) -> bool {
        Arc::ptr_eq(&self.def, &other.def) && {
            let a = self.fields_snapshot();
            let b = other.fields_snapshot();
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
        }
    }
}

/// Process-wide, name-keyed table of record definitions.
///
/// First registration wins: an identical re-registration is a no-op, a
/// conflicting one is logged and reported but never replaces the original.
#[derive(Default)]
pub struct RecordRegistry {
    defs: Mutex<HashMap<String, Arc<RecordDef>>>,
}

impl RecordRegistry {
    pub fn new() -> Self {
        RecordRegistry::default()
    }

    /// Registers a definition, validating that its field types do not close
    /// a cycle through other registered definitions.
    pub fn register(&self, def: RecordDef) -> Result<Arc<RecordDef>, RuntimeError> {
        let mut defs = self.defs.lock();

        if let Some(existing) = defs.get(&def.name) {
            if existing.same_shape(&def) {
                return Ok(existing.clone());
            }
            warn!(record = %def.name, "record re-registered with a conflicting shape; keeping first definition");
            return Err(RuntimeError::RecordDefinitionConflict { name: def.name });
        }

        let mut visiting = HashSet::new();
        let mut path = Vec::new();
        Self::validate_acyclic(&def, &def, &defs, &mut visiting, &mut path)?;

        let def = Arc::new(def);
        defs.insert(def.name.clone(), def.clone());
        Ok(def)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RecordDef>> {
        self.defs.lock().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.defs.lock().contains_key(name)
    }

    /// Depth-first walk over the field-type graph. References to not-yet
    /// registered records are allowed; only a closed directed cycle fails.
    fn validate_acyclic(
        root: &RecordDef,
        current: &RecordDef,
        defs: &HashMap<String, Arc<RecordDef>>,
        visiting: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Result<(), RuntimeError> {
        if !visiting.insert(current.name.clone()) {
            path.push(current.name.clone());
            return Err(RuntimeError::RecordTypeCycle {
                name: root.name.clone(),
                path: path.join(" -> "),
            });
        }
        path.push(current.name.clone());

        for field in &current.fields {
            if let TypeTag::Record(target) = &field.ty {
                if target == &root.name {
                    path.push(target.clone());
                    return Err(RuntimeError::RecordTypeCycle {
                        name: root.name.clone(),
                        path: path.join(" -> "),
                    });
                }
                if let Some(next) = defs.get(target) {
                    Self::validate_acyclic(root, next, defs, visiting, path)?;
                }
            }
        }

        visiting.remove(&current.name);
        path.pop();
        Ok(())
    }
}
