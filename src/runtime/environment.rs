use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::runtime::{error::RuntimeError, value::ValueRef};

/// Shared handle to a scope. Closures keep the environment of their
/// definition point alive through one of these.
pub type EnvRef = Arc<Environment>;

/// An ordered set of name bindings with an optional parent scope.
///
/// The global environment has process lifetime; nested environments are
/// created on block/function entry and dropped when no closure or call frame
/// holds them (modulo cycles, which the collector handles).
pub struct Environment {
    values: RwLock<HashMap<String, ValueRef>>,
    parent: Option<EnvRef>,
}

impl Environment {
    /// Creates a root scope with no parent.
    pub fn root() -> EnvRef {
        Arc::new(Environment {
            values: RwLock::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a child scope. Lookups fall through to `parent`.
    pub fn with_parent(parent: EnvRef) -> EnvRef {
        Arc::new(Environment {
            values: RwLock::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Defines (or shadows) a binding in this scope.
    pub fn define(&self, name: impl Into<String>, value: ValueRef) {
        self.values.write().insert(name.into(), value);
    }

    /// Looks a name up, walking the parent chain outward.
    pub fn get(&self, name: &str) -> Result<ValueRef, RuntimeError> {
        if let Some(value) = self.values.read().get(name) {
            return Ok(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.get(name),
            None => Err(RuntimeError::UnboundName {
                name: name.to_string(),
            }),
        }
    }

    /// Rebinds an existing name in the nearest scope that defines it.
    pub fn assign(&self, name: &str, value: ValueRef) -> Result<(), RuntimeError> {
        {
            let mut values = self.values.write();
            if values.contains_key(name) {
                values.insert(name.to_string(), value);
                return Ok(());
            }
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(RuntimeError::UnboundName {
                name: name.to_string(),
            }),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        if self.values.read().contains_key(name) {
            return true;
        }
        self.parent.as_ref().is_some_and(|p| p.has(name))
    }

    /// All names visible from this scope, for error suggestions.
    pub fn names(&self) -> Vec<String> {
        let mut out: Vec<String> = self.values.read().keys().cloned().collect();
        if let Some(parent) = &self.parent {
            out.extend(parent.names());
        }
        out.sort();
        out.dedup();
        out
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.parent.clone()
    }

    /// Snapshot of this scope's own bindings, used by the GC mark phase.
    pub(crate) fn bindings_snapshot(&self) -> Vec<ValueRef> {
        self.values.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::Value;

    #[test]
    fn test_lookup_walks_parent_chain() {
        let root = Environment::root();
        root.define("x", Value::int(1));
        let child = Environment::with_parent(root.clone());
        let grandchild = Environment::with_parent(child);

        assert_eq!(grandchild.get("x").unwrap().as_int().unwrap(), 1);
    }

    #[test]
    fn test_missing_name_fails_at_root() {
        let root = Environment::root();
        let child = Environment::with_parent(root);

        let err = child.get("nope").unwrap_err();
        assert_eq!(
            err,
            RuntimeError::UnboundName {
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_shadowing_hides_outer_binding() {
        let root = Environment::root();
        root.define("x", Value::int(1));
        let child = Environment::with_parent(root.clone());
        child.define("x", Value::int(2));

        assert_eq!(child.get("x").unwrap().as_int().unwrap(), 2);
        assert_eq!(root.get("x").unwrap().as_int().unwrap(), 1);
    }

    #[test]
    fn test_assign_rebinds_in_defining_scope() {
        let root = Environment::root();
        root.define("x", Value::int(1));
        let child = Environment::with_parent(root.clone());

        child.assign("x", Value::int(5)).unwrap();
        assert_eq!(root.get("x").unwrap().as_int().unwrap(), 5);

        assert!(child.assign("unknown", Value::null()).is_err());
    }

    #[test]
    fn test_names_merges_scopes_for_suggestions() {
        let root = Environment::root();
        root.define("outer", Value::int(1));
        let child = Environment::with_parent(root);
        child.define("inner", Value::int(2));

        let names = child.names();
        assert!(names.contains(&"outer".to_string()));
        assert!(names.contains(&"inner".to_string()));
    }
}
