use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::{exec::executor::Executor, runtime::error::RuntimeError};

/// Shared handle to a registered backend. The mutex serializes every call
/// into the backend session.
pub type ExecutorHandle = Arc<Mutex<dyn Executor>>;

/// Name-keyed table of language backends.
///
/// Registration under several identifiers binds aliases ("js",
/// "javascript") to one shared session. Re-registering a name replaces the
/// previous binding; the replacement wins and is logged.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, ExecutorHandle>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        ExecutorRegistry::default()
    }

    /// Registers `executor` under every name in `names`.
    pub fn register<E>(&self, names: &[&str], executor: E)
    where
        E: Executor + 'static,
    {
        let handle: ExecutorHandle = Arc::new(Mutex::new(executor));
        self.register_handle(names, handle);
    }

    pub fn register_handle(&self, names: &[&str], handle: ExecutorHandle) {
        let mut executors = self.executors.write();
        for name in names {
            if executors.insert(name.to_string(), handle.clone()).is_some() {
                warn!(language = *name, "replacing registered executor");
            }
        }
    }

    pub fn unregister(&self, language: &str) -> bool {
        self.executors.write().remove(language).is_some()
    }

    pub fn resolve(&self, language: &str) -> Result<ExecutorHandle, RuntimeError> {
        self.executors
            .read()
            .get(language)
            .cloned()
            .ok_or_else(|| RuntimeError::ExecutorNotFound {
                language: language.to_string(),
            })
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.executors.read().contains_key(language)
    }

    pub fn supported_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::{Value, ValueRef};

    struct FakeExecutor {
        language: &'static str,
        result: i64,
    }

    impl Executor for FakeExecutor {
        fn execute(&mut self, _code: &str) -> Result<(), RuntimeError> {
            Ok(())
        }

        fn evaluate_with_return(&mut self, _code: &str) -> Result<ValueRef, RuntimeError> {
            Ok(Arc::new(Value::Int(self.result)))
        }

        fn call_function(
            &mut self,
            _name: &str,
            _args: &[ValueRef],
        ) -> Result<ValueRef, RuntimeError> {
            Ok(Arc::new(Value::Int(self.result)))
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn language(&self) -> &str {
            self.language
        }

        fn captured_output(&mut self) -> String {
            String::new()
        }
    }

    #[test]
    fn test_resolution_finds_registered_backend() {
        let registry = ExecutorRegistry::new();
        registry.register(
            &["python"],
            FakeExecutor {
                language: "python",
                result: 1,
            },
        );

        let handle = registry.resolve("python").unwrap();
        let value = handle.lock().evaluate_with_return("1").unwrap();
        assert_eq!(*value, Value::Int(1));
    }

    #[test]
    fn test_unknown_language_is_an_error() {
        let registry = ExecutorRegistry::new();
        // The Ok arm is a handle to a non-Debug trait object, so match
        // instead of unwrapping.
        match registry.resolve("cobol") {
            Err(err) => assert_eq!(
                err,
                RuntimeError::ExecutorNotFound {
                    language: "cobol".to_string()
                }
            ),
            Ok(_) => panic!("expected resolution to fail"),
        }
    }

    #[test]
    fn test_aliases_share_one_session() {
        let registry = ExecutorRegistry::new();
        registry.register(
            &["javascript", "js"],
            FakeExecutor {
                language: "javascript",
                result: 7,
            },
        );

        let a = registry.resolve("javascript").unwrap();
        let b = registry.resolve("js").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_replacement_wins() {
        let registry = ExecutorRegistry::new();
        registry.register(
            &["python"],
            FakeExecutor {
                language: "python",
                result: 1,
            },
        );
        registry.register(
            &["python"],
            FakeExecutor {
                language: "python",
                result: 2,
            },
        );

        let handle = registry.resolve("python").unwrap();
        let value = handle.lock().evaluate_with_return("x").unwrap();
        assert_eq!(*value, Value::Int(2));
    }

    #[test]
    fn test_supported_languages_are_sorted() {
        let registry = ExecutorRegistry::new();
        registry.register(
            &["python"],
            FakeExecutor {
                language: "python",
                result: 0,
            },
        );
        registry.register(
            &["bash"],
            FakeExecutor {
                language: "bash",
                result: 0,
            },
        );

        assert_eq!(
            registry.supported_languages(),
            vec!["bash".to_string(), "python".to_string()]
        );
        assert!(registry.is_supported("bash"));
        assert!(!registry.is_supported("lua"));
    }
}
